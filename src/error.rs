use crate::documents::DocumentKind;
use crate::update::UpdateStatus;
use crate::workflow::ReviewEvent;

/// User-correctable failures. Raised before anything is written.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please upload the Termination Document")]
    MissingTerminationDocument,
    #[error("End date is required for Renew")]
    MissingEndDate,
    #[error("Document name and Issue Date are required for the uploaded {0} document")]
    IncompleteUpload(DocumentKind),
    #[error("The uploaded {0} document has no content")]
    EmptyUpload(DocumentKind),
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    MalformedDate(String),
    #[error("A reason is required to send the update back")]
    MissingReturnReason,
    #[error("A decision (Renew or Terminate) is required")]
    MissingDecision,
    #[error("Unknown decision '{0}'")]
    UnknownDecision(String),
    #[error("Unknown user role '{0}'")]
    UnknownRole(String),
    #[error("New end date must be after current end date ({current})")]
    EndDateNotAfterCurrent { current: String, proposed: String },
    #[error("Contract {0} is already terminated")]
    AlreadyTerminated(String),
    #[error("Contract is missing required field: {0}")]
    MissingField(&'static str),
}

#[derive(thiserror::Error, Debug)]
pub enum DocumentStoreError {
    #[error("document storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("document storage rejected the upload: {0}")]
    Rejected(String),
}

#[derive(thiserror::Error, Debug)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("user {user_id} is not permitted to {event} on contract {contract_id}")]
    Unauthorized {
        user_id: u64,
        contract_id: u64,
        event: ReviewEvent,
    },
    #[error("contract {0} not found")]
    ContractNotFound(u64),
    #[error("contract update {0} not found")]
    UpdateNotFound(u64),
    #[error("contract {0} has no update in review")]
    NoLiveUpdate(u64),
    #[error("cannot {event} while the update is {from}")]
    InvalidTransition {
        from: UpdateStatus,
        event: ReviewEvent,
    },
    #[error("user {user_id} is not permitted to {action}")]
    Forbidden { user_id: u64, action: &'static str },
    #[error(
        "conflict on contract {contract_id}: expected live update {}, found {}",
        .expected.map_or("none", UpdateStatus::as_str),
        .found.map_or("none", UpdateStatus::as_str)
    )]
    Conflict {
        contract_id: u64,
        expected: Option<UpdateStatus>,
        found: Option<UpdateStatus>,
    },
    #[error("document upload failed: {0}")]
    Document(#[from] DocumentStoreError),
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("record encoding failed: {0}")]
    Codec(String),
}

impl WorkflowError {
    pub fn is_validation(&self) -> bool {
        matches!(self, WorkflowError::Validation(_))
    }
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            WorkflowError::Unauthorized { .. } | WorkflowError::Forbidden { .. }
        )
    }
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            WorkflowError::ContractNotFound(_)
                | WorkflowError::UpdateNotFound(_)
                | WorkflowError::NoLiveUpdate(_)
        )
    }
    pub fn is_conflict(&self) -> bool {
        matches!(self, WorkflowError::Conflict { .. })
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
