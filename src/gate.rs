//! Document Attachment Gate.
//!
//! Decides from document presence alone whether a document-sensitive
//! transition may go ahead. A Terminate needs at least one termination
//! document, already attached or uploaded in the same call. A Renew needs an
//! explicit new end date. Any upload must carry a display name, a parseable
//! issue date, and content.
use crate::documents::{DocumentKind, DocumentUpload};
use crate::error::ValidationError;
use crate::types::CalendarDate;
use crate::update::Decision;
use crate::utils::parse_date;

#[derive(Debug, Clone, Copy)]
pub struct AttachmentRequest<'a> {
    pub decision: Decision,
    pub existing_termination_documents: usize,
    pub upload: Option<&'a DocumentUpload>,
    pub renewal_end_date: Option<&'a str>,
}

/// What the gate parsed while letting a request through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clearance {
    pub end_date: Option<CalendarDate>,
    pub upload_issue_date: Option<CalendarDate>,
}

pub fn kind_for(decision: Decision) -> DocumentKind {
    match decision {
        Decision::Renew => DocumentKind::Contract,
        Decision::Terminate => DocumentKind::Termination,
    }
}

pub fn evaluate(request: &AttachmentRequest<'_>) -> Result<Clearance, ValidationError> {
    let upload_issue_date = request
        .upload
        .map(|upload| validate_upload(upload, kind_for(request.decision)))
        .transpose()?;

    let end_date = match request.decision {
        Decision::Terminate => {
            if request.existing_termination_documents == 0 && upload_issue_date.is_none() {
                return Err(ValidationError::MissingTerminationDocument);
            }
            None
        }
        Decision::Renew => Some(required_end_date(request.renewal_end_date)?),
    };

    tracing::debug!(
        decision = %request.decision,
        existing = request.existing_termination_documents,
        uploading = request.upload.is_some(),
        "attachment gate passed"
    );
    Ok(Clearance {
        end_date,
        upload_issue_date,
    })
}

pub fn is_allowed(request: &AttachmentRequest<'_>) -> bool {
    evaluate(request).is_ok()
}

/// Display name, issue date and content must all be present.
pub fn validate_upload(
    upload: &DocumentUpload,
    kind: DocumentKind,
) -> Result<CalendarDate, ValidationError> {
    if upload.display_name.trim().is_empty() || upload.issue_date.trim().is_empty() {
        return Err(ValidationError::IncompleteUpload(kind));
    }
    let issue_date = parse_date(&upload.issue_date)?;
    if upload.bytes.is_empty() {
        return Err(ValidationError::EmptyUpload(kind));
    }
    Ok(issue_date)
}

/// Optional date field: blank means absent, anything else must parse.
pub fn optional_date(raw: Option<&str>) -> Result<Option<CalendarDate>, ValidationError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => parse_date(raw).map(Some),
    }
}

fn required_end_date(raw: Option<&str>) -> Result<CalendarDate, ValidationError> {
    optional_date(raw)?.ok_or(ValidationError::MissingEndDate)
}

/// A renewal has to move the end date forward.
pub fn check_renewal_date(
    current: CalendarDate,
    proposed: CalendarDate,
) -> Result<(), ValidationError> {
    if proposed <= current {
        return Err(ValidationError::EndDateNotAfterCurrent {
            current: current.to_string(),
            proposed: proposed.to_string(),
        });
    }
    Ok(())
}

/// Completion-time check for a Renew: the end date must have been staged.
pub fn require_staged_end_date(
    staged: Option<CalendarDate>,
) -> Result<CalendarDate, ValidationError> {
    staged.ok_or(ValidationError::MissingEndDate)
}

/// Completion-time check for a Terminate.
pub fn require_termination_document(existing: usize) -> Result<(), ValidationError> {
    if existing == 0 {
        return Err(ValidationError::MissingTerminationDocument);
    }
    Ok(())
}
