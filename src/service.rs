//! Service layer API for contract review operations
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::actor::ActorContext;
use crate::config::{AuthorizationPolicy, DEFAULT_ORPHAN_GRACE_SECS, WorkflowConfig};
use crate::contract::{
    Contract, ContractDetails, ContractDocument, ContractStatus, TerminationDocument,
    TerminationFlag,
};
use crate::documents::{DocumentStore, DocumentUpload, FsDocumentStore, StoredFile};
use crate::error::{ValidationError, WorkflowError};
use crate::gate::{self, AttachmentRequest};
use crate::projection::{self, ContractUpdateView};
use crate::store::{ContractStore, StoreTx, TxResult, abort};
use crate::types::{CalendarDate, TimeStamp};
use crate::update::{ContractUpdate, Decision, UpdateStatus};
use crate::utils::new_uuid_to_bech32;
use crate::workflow::{self, ReviewEvent};

/// What a Manager, Backup or Owner sends with a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionInput {
    pub decision: Decision,
    pub comments: Option<String>,
    pub end_date: Option<String>,
    pub document: Option<DocumentUpload>,
}

impl DecisionInput {
    pub fn new(decision: Decision) -> Self {
        Self {
            decision,
            comments: None,
            end_date: None,
            document: None,
        }
    }
    pub fn renew(end_date: &str) -> Self {
        Self::new(Decision::Renew).with_end_date(end_date)
    }
    pub fn terminate() -> Self {
        Self::new(Decision::Terminate)
    }
    pub fn with_comments(mut self, comments: &str) -> Self {
        self.comments = Some(comments.to_string());
        self
    }
    pub fn with_end_date(mut self, end_date: &str) -> Self {
        self.end_date = Some(end_date.to_string());
        self
    }
    pub fn with_document(mut self, document: DocumentUpload) -> Self {
        self.document = Some(document);
        self
    }
}

// a document accepted by the store, waiting to be attached in the transaction
#[derive(Debug, Clone)]
enum StagedDocument {
    Contract(ContractDocument),
    Termination(TerminationDocument),
}

pub struct ReviewService<D: DocumentStore = FsDocumentStore> {
    store: ContractStore,
    documents: D,
    policy: AuthorizationPolicy,
    orphan_grace: Duration,
}

impl ReviewService<FsDocumentStore> {
    /// Open the database and document directory named in `config`.
    pub fn open(config: &WorkflowConfig) -> Result<Self, WorkflowError> {
        let db = sled::open(&config.database_path)?;
        let documents = FsDocumentStore::new(&config.document_root)?;
        info!(
            database = %config.database_path.display(),
            documents = %config.document_root.display(),
            "review service opened"
        );
        Ok(Self::new(Arc::new(db), documents, config.authorization)?
            .with_orphan_grace(config.orphan_grace()))
    }
}

impl<D: DocumentStore> ReviewService<D> {
    pub fn new(
        instance: Arc<sled::Db>,
        documents: D,
        policy: AuthorizationPolicy,
    ) -> Result<Self, WorkflowError> {
        Ok(Self {
            store: ContractStore::new(instance)?,
            documents,
            policy,
            orphan_grace: Duration::from_secs(DEFAULT_ORPHAN_GRACE_SECS),
        })
    }

    /// How old an unreferenced document must be before the sweep reports it.
    pub fn with_orphan_grace(mut self, grace: Duration) -> Self {
        self.orphan_grace = grace;
        self
    }

    pub fn documents(&self) -> &D {
        &self.documents
    }

    /// Register a contract so it can enter review. Contract creation itself
    /// belongs to the contract register; this is its hand-off point.
    pub fn register_contract(&self, details: ContractDetails) -> Result<Contract, WorkflowError> {
        let contract = self.store.insert_contract(details)?;
        info!(contract_id = contract.id, code = %contract.code, "contract registered");
        Ok(contract)
    }

    pub fn contract(&self, contract_id: u64) -> Result<Contract, WorkflowError> {
        self.store.contract(contract_id)
    }

    pub fn update(&self, update_id: u64) -> Result<ContractUpdate, WorkflowError> {
        self.store.update(update_id)
    }

    pub fn flush(&self) -> Result<(), WorkflowError> {
        self.store.flush()
    }

    /// Submit a decision: first submission, promotion of a draft, resubmission
    /// after a return, or a correction while the admin has not acted yet.
    pub fn submit_decision(
        &self,
        actor: &ActorContext,
        contract_id: u64,
        input: DecisionInput,
    ) -> Result<ContractUpdate, WorkflowError> {
        self.record_decision(actor, contract_id, &input, ReviewEvent::Submit)
    }

    /// Store decision, comments and documents on the live update without moving
    /// it. Opens a draft when the contract has nothing in review.
    pub fn save_progress(
        &self,
        actor: &ActorContext,
        contract_id: u64,
        input: DecisionInput,
    ) -> Result<ContractUpdate, WorkflowError> {
        self.record_decision(actor, contract_id, &input, ReviewEvent::SaveProgress)
    }

    /// Apply the live update's decision to the contract and close the update.
    pub fn complete_review(
        &self,
        actor: &ActorContext,
        contract_id: u64,
    ) -> Result<Contract, WorkflowError> {
        let (contract, live) = self.review_target(actor, contract_id, ReviewEvent::Complete)?;
        // Nothing is written unless the gate passes on what is stored now
        completion_for(&contract, &live)?;
        self.commit_completion(actor, contract_id, &live)
    }

    fn commit_completion(
        &self,
        actor: &ActorContext,
        contract_id: u64,
        observed: &ContractUpdate,
    ) -> Result<Contract, WorkflowError> {
        let (completed, update) = self
            .store
            .transact(|tx| {
                let mut contract = tx.contract(contract_id)?;
                let Some(mut update) = expect_live(tx, &contract, Some(observed))? else {
                    return abort(WorkflowError::NoLiveUpdate(contract_id));
                };
                // applied from the record read here, never from the validated copy
                let completion = completion_for(&contract, &update).or_else(abort)?;
                let now = TimeStamp::new();

                update.status = UpdateStatus::Completed;
                update.updated_at = now;
                contract.live_update_id = None;
                match completion {
                    Completion::Renew(end_date) => {
                        contract.end_date = end_date;
                        contract.status = ContractStatus::Active;
                    }
                    Completion::Terminate => {
                        update.has_document = true;
                        contract.status = ContractStatus::Terminated;
                        contract.contract_termination = Some(TerminationFlag::Yes);
                    }
                }
                contract.touch(actor.user_id);

                tx.put_update(&update)?;
                tx.put_contract(&contract)?;
                Ok((contract, update))
            })
            .inspect_err(|err| log_conflict(err, contract_id))?;

        info!(
            contract_id,
            update_id = update.id,
            admin_id = actor.user_id,
            decision = update.decision.map_or("none", Decision::as_str),
            contract_status = completed.status.as_str(),
            end_date = %completed.end_date,
            "review completed"
        );
        Ok(completed)
    }

    /// Return the live update to its submitter with a reason.
    pub fn send_back(
        &self,
        actor: &ActorContext,
        contract_id: u64,
        reason: &str,
    ) -> Result<ContractUpdate, WorkflowError> {
        let reason = reason.trim();
        let (_, live) = self.review_target(actor, contract_id, ReviewEvent::SendBack)?;
        if reason.is_empty() {
            return Err(ValidationError::MissingReturnReason.into());
        }
        self.commit_send_back(actor, contract_id, &live, reason)
    }

    fn commit_send_back(
        &self,
        actor: &ActorContext,
        contract_id: u64,
        observed: &ContractUpdate,
        reason: &str,
    ) -> Result<ContractUpdate, WorkflowError> {
        let next = workflow::next_status(Some(observed.status), ReviewEvent::SendBack)?;

        let returned = self
            .store
            .transact(|tx| {
                let contract = tx.contract(contract_id)?;
                let Some(mut update) = expect_live(tx, &contract, Some(observed))? else {
                    return abort(WorkflowError::NoLiveUpdate(contract_id));
                };
                let now = TimeStamp::new();

                update.status = next;
                update.admin_comments = Some(reason.to_string());
                update.returned_reason = Some(reason.to_string());
                update.returned_date = Some(now.clone());
                update.updated_at = now;

                tx.put_update(&update)?;
                Ok(update)
            })
            .inspect_err(|err| log_conflict(err, contract_id))?;

        info!(
            contract_id,
            update_id = returned.id,
            admin_id = actor.user_id,
            reason,
            "update sent back"
        );
        Ok(returned)
    }

    /// Live updates the viewer may see, newest first.
    pub fn list_active_updates(
        &self,
        viewer: &ActorContext,
    ) -> Result<Vec<ContractUpdateView>, WorkflowError> {
        let mut live: Vec<(Contract, ContractUpdate)> = Vec::new();
        for contract in self.store.contracts()? {
            let Some(update_id) = contract.live_update_id else {
                continue;
            };
            if !projection::is_visible(viewer, &contract) {
                continue;
            }
            match self.store.update(update_id) {
                Ok(update) if update.is_live() => live.push((contract, update)),
                // completed since the contract was read
                Ok(_) => continue,
                Err(WorkflowError::UpdateNotFound(_)) => {
                    warn!(
                        contract_id = contract.id,
                        update_id, "contract points at a missing update"
                    );
                }
                Err(err) => return Err(err),
            }
        }
        live.sort_by_key(|(_, update)| std::cmp::Reverse(update.recency_key()));

        Ok(live
            .iter()
            .map(|(contract, update)| ContractUpdateView::project(viewer, contract, update))
            .collect())
    }

    /// Every update of a contract, completed ones included, oldest first.
    pub fn history(
        &self,
        actor: &ActorContext,
        contract_id: u64,
    ) -> Result<Vec<ContractUpdate>, WorkflowError> {
        let contract = self.store.contract(contract_id)?;
        workflow::authorize(actor, &contract, ReviewEvent::ViewHistory, &self.policy)?;
        self.store.updates_for(contract_id)
    }

    /// Stored documents no contract refers to, left behind when an upload
    /// succeeded but its commit did not. Removes them when `delete` is set.
    ///
    /// Files younger than the orphan grace period are never reported: they may
    /// belong to an upload whose transaction has not committed yet.
    pub fn sweep_orphan_documents(
        &self,
        actor: &ActorContext,
        delete: bool,
    ) -> Result<Vec<String>, WorkflowError> {
        if !actor.is_admin() {
            return Err(WorkflowError::Forbidden {
                user_id: actor.user_id,
                action: "sweep orphaned documents",
            });
        }
        let Some(cutoff) = SystemTime::now().checked_sub(self.orphan_grace) else {
            return Ok(Vec::new());
        };

        let contracts = self.store.contracts()?;
        let referenced: HashSet<&str> = contracts
            .iter()
            .flat_map(Contract::document_references)
            .collect();

        let mut orphans = Vec::new();
        for reference in self.documents.references()? {
            if referenced.contains(reference.as_str()) {
                continue;
            }
            if self.documents.stored_at(&reference)? > cutoff {
                debug!(reference = %reference, "unreferenced document inside grace period");
                continue;
            }
            orphans.push(reference);
        }

        for reference in &orphans {
            warn!(reference = %reference, delete, "orphaned document");
            if delete {
                self.documents.remove(reference)?;
            }
        }
        Ok(orphans)
    }

    // Shared path of submit and save progress
    fn record_decision(
        &self,
        actor: &ActorContext,
        contract_id: u64,
        input: &DecisionInput,
        event: ReviewEvent,
    ) -> Result<ContractUpdate, WorkflowError> {
        // Load and check who is acting
        let contract = self.store.contract(contract_id)?;
        workflow::authorize(actor, &contract, event, &self.policy)?;
        contract.ensure_open()?;

        let observed = self.live_update(&contract)?;
        let current = observed.as_ref().map(|update| update.status);
        let next = workflow::next_status(current, event)?;

        // Validate everything before touching storage
        let (end_date, issue_date) = if workflow::is_resubmission(current, event) {
            let clearance = gate::evaluate(&AttachmentRequest {
                decision: input.decision,
                existing_termination_documents: contract.termination_documents.len(),
                upload: input.document.as_ref(),
                renewal_end_date: input.end_date.as_deref(),
            })?;
            (clearance.end_date, clearance.upload_issue_date)
        } else {
            let end_date = gate::optional_date(input.end_date.as_deref())?;
            let issue_date = input
                .document
                .as_ref()
                .map(|upload| gate::validate_upload(upload, gate::kind_for(input.decision)))
                .transpose()?;
            (end_date, issue_date)
        };
        let end_date = match input.decision {
            Decision::Renew => end_date,
            Decision::Terminate => None,
        };
        if let Some(end_date) = end_date {
            gate::check_renewal_date(contract.end_date, end_date)?;
        }

        // Ids are taken before the transaction, which sled may run more than once
        let (update_id, previous_update_id) = match &observed {
            Some(update) => (update.id, update.previous_update_id),
            None => (
                self.store.next_id()?,
                self.store
                    .latest_update_for(contract_id)?
                    .map(|update| update.id),
            ),
        };

        // Upload before commit so a failed upload changes nothing
        let staged = match (&input.document, issue_date) {
            (Some(upload), Some(issue_date)) => {
                let stored = self.documents.put(upload)?;
                Some(stage_document(input.decision, upload, issue_date, stored)?)
            }
            _ => None,
        };

        let update = self
            .store
            .transact(|tx| {
                let mut contract = tx.contract(contract_id)?;
                let live = expect_live(tx, &contract, observed.as_ref())?;
                let now = TimeStamp::new();

                let mut update = live.unwrap_or_else(|| {
                    ContractUpdate::new(update_id, contract_id, next)
                        .set_previous_update(previous_update_id)
                });

                // a submitted update is being corrected; keep what it said before
                if matches!(
                    current,
                    Some(UpdateStatus::Returned | UpdateStatus::PendingReview | UpdateStatus::Updated)
                ) && event == ReviewEvent::Submit
                {
                    snapshot_contract(&mut update, &contract);
                    update.correction_date = Some(now.clone());
                }

                let renewal_document = update.has_document && update.decision == Some(Decision::Renew);
                update.status = next;
                update.decision = Some(input.decision);
                update.decision_comments = input.comments.clone();
                update.initial_expiration_date = match input.decision {
                    Decision::Renew => end_date.or(update.initial_expiration_date),
                    Decision::Terminate => None,
                };
                if event == ReviewEvent::Submit {
                    update.response_provided_by_user_id = Some(actor.user_id);
                    update.response_date = Some(now.clone());
                }
                update.updated_at = now;

                match &staged {
                    Some(StagedDocument::Contract(doc)) => contract.documents.push(doc.clone()),
                    Some(StagedDocument::Termination(doc)) => {
                        contract.termination_documents.push(doc.clone())
                    }
                    None => {}
                }
                // follows what the current decision needs, not what was uploaded last
                update.has_document = match input.decision {
                    Decision::Renew => {
                        renewal_document || matches!(staged, Some(StagedDocument::Contract(_)))
                    }
                    Decision::Terminate => contract.has_termination_document(),
                };
                contract.live_update_id = Some(update.id);

                tx.put_update(&update)?;
                tx.put_contract(&contract)?;
                Ok(update)
            })
            .inspect_err(|err| log_conflict(err, contract_id))?;

        info!(
            contract_id,
            update_id = update.id,
            user_id = actor.user_id,
            event = %event,
            decision = %input.decision,
            from = current.map_or("none", UpdateStatus::as_str),
            to = update.status.as_str(),
            has_document = update.has_document,
            "decision recorded"
        );
        Ok(update)
    }

    // The update `contract.live_update_id` points at. A pointer to a completed
    // update means a completion committed between the two reads.
    fn live_update(&self, contract: &Contract) -> Result<Option<ContractUpdate>, WorkflowError> {
        let Some(update_id) = contract.live_update_id else {
            return Ok(None);
        };
        let update = self.store.update(update_id)?;
        if !update.is_live() {
            return Err(WorkflowError::Conflict {
                contract_id: contract.id,
                expected: None,
                found: Some(update.status),
            });
        }
        Ok(Some(update))
    }

    // The contract and the update the admin is acting on, checked against the
    // transition table. With none live, a finished review means someone else
    // got there first.
    fn review_target(
        &self,
        actor: &ActorContext,
        contract_id: u64,
        event: ReviewEvent,
    ) -> Result<(Contract, ContractUpdate), WorkflowError> {
        let contract = self.store.contract(contract_id)?;
        workflow::authorize(actor, &contract, event, &self.policy)?;

        let live = match self.live_update(&contract)? {
            Some(update) => update,
            None => {
                return match self.store.latest_update_for(contract_id)? {
                    Some(latest) => Err(WorkflowError::Conflict {
                        contract_id,
                        expected: Some(UpdateStatus::PendingReview),
                        found: Some(latest.status),
                    }),
                    None => Err(WorkflowError::NoLiveUpdate(contract_id)),
                };
            }
        };
        workflow::next_status(Some(live.status), event)?;
        Ok((contract, live))
    }
}

// What completing `update` does to `contract`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    Renew(CalendarDate),
    Terminate,
}

fn completion_for(contract: &Contract, update: &ContractUpdate) -> Result<Completion, WorkflowError> {
    contract.ensure_open()?;
    match update.decision.ok_or(ValidationError::MissingDecision)? {
        Decision::Renew => {
            let end_date = gate::require_staged_end_date(update.initial_expiration_date)?;
            gate::check_renewal_date(contract.end_date, end_date)?;
            Ok(Completion::Renew(end_date))
        }
        Decision::Terminate => {
            gate::require_termination_document(contract.termination_documents.len())?;
            Ok(Completion::Terminate)
        }
    }
}

/// Re-read the live update inside the transaction and abort with a conflict
/// if it differs in any field from the one `observed` before validation.
fn expect_live(
    tx: &StoreTx<'_>,
    contract: &Contract,
    observed: Option<&ContractUpdate>,
) -> TxResult<Option<ContractUpdate>> {
    let found = match contract.live_update_id {
        Some(update_id) => Some(tx.update(update_id)?),
        None => None,
    };
    let unchanged = match (observed, &found) {
        (None, None) => true,
        (Some(seen), Some(now)) => seen == now,
        _ => false,
    };
    if !unchanged {
        return abort(WorkflowError::Conflict {
            contract_id: contract.id,
            expected: observed.map(|update| update.status),
            found: found.as_ref().map(|update| update.status),
        });
    }
    Ok(found)
}

fn snapshot_contract(update: &mut ContractUpdate, contract: &Contract) {
    update
        .initial_vendor_name
        .get_or_insert_with(|| contract.vendor_name.clone());
    update
        .initial_contract_type
        .get_or_insert_with(|| contract.contract_type.clone());
    update
        .initial_description
        .get_or_insert_with(|| contract.description.clone());
}

fn stage_document(
    decision: Decision,
    upload: &DocumentUpload,
    issue_date: CalendarDate,
    stored: StoredFile,
) -> Result<StagedDocument, WorkflowError> {
    let id = new_uuid_to_bech32("doc_").map_err(|e| WorkflowError::Codec(e.to_string()))?;
    let created_at = TimeStamp::<Utc>::new();
    let display_name = upload.display_name.trim().to_string();

    Ok(match decision {
        Decision::Renew => StagedDocument::Contract(ContractDocument {
            id,
            file_name: upload.file_name.clone(),
            custom_document_name: display_name,
            document_signed_date: issue_date,
            file_path: stored.reference,
            file_size: stored.size,
            content_type: upload.content_type.clone(),
            created_at,
        }),
        Decision::Terminate => StagedDocument::Termination(TerminationDocument {
            id,
            file_name: upload.file_name.clone(),
            document_name: display_name,
            document_date: issue_date,
            file_path: stored.reference,
            file_size: stored.size,
            content_type: upload.content_type.clone(),
            created_at,
        }),
    })
}

fn log_conflict(err: &WorkflowError, contract_id: u64) {
    if err.is_conflict() {
        warn!(contract_id, error = %err, "transition lost a race");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{TempDir, tempdir};

    const MANAGER: u64 = 1;
    const ADMIN: u64 = 100;

    fn service() -> (TempDir, ReviewService, Contract) {
        let dir = tempdir().unwrap();
        let db = Arc::new(sled::open(dir.path().join("service.db")).unwrap());
        let documents = FsDocumentStore::new(dir.path().join("documents")).unwrap();
        let service = ReviewService::new(db, documents, AuthorizationPolicy::default()).unwrap();
        let contract = service
            .register_contract(
                ContractDetails::new("CT1")
                    .set_end_date(CalendarDate::from_ymd(2025, 12, 31).unwrap())
                    .set_owner(MANAGER)
                    .set_backup(2)
                    .set_owner_manager(3),
            )
            .unwrap();
        (dir, service, contract)
    }

    #[test]
    fn completion_rejects_a_decision_saved_after_validation() {
        let (_dir, service, contract) = service();
        let manager = ActorContext::manager(MANAGER);
        let admin = ActorContext::admin(ADMIN);
        service
            .submit_decision(&manager, contract.id, DecisionInput::renew("2026-06-30"))
            .unwrap();

        let (validated, observed) = service
            .review_target(&admin, contract.id, ReviewEvent::Complete)
            .unwrap();
        assert_eq!(
            completion_for(&validated, &observed).unwrap(),
            Completion::Renew(CalendarDate::from_ymd(2026, 6, 30).unwrap())
        );

        // same status, different decision
        let saved = service
            .save_progress(&manager, contract.id, DecisionInput::terminate())
            .unwrap();
        assert_eq!(saved.status, observed.status);

        let err = service
            .commit_completion(&admin, contract.id, &observed)
            .unwrap_err();
        assert!(err.is_conflict());

        let stored = service.contract(contract.id).unwrap();
        assert_eq!(stored.end_date, CalendarDate::from_ymd(2025, 12, 31).unwrap());
        assert_eq!(stored.status, ContractStatus::Active);
        let update = service.update(observed.id).unwrap();
        assert_eq!(update.status, UpdateStatus::PendingReview);
        assert_eq!(update.decision, Some(Decision::Terminate));

        // a fresh attempt validates the saved decision
        let err = service.complete_review(&admin, contract.id).unwrap_err();
        assert_eq!(err.to_string(), "Please upload the Termination Document");
    }

    #[test]
    fn send_back_rejects_an_update_saved_after_validation() {
        let (_dir, service, contract) = service();
        let manager = ActorContext::manager(MANAGER);
        let admin = ActorContext::admin(ADMIN);
        service
            .submit_decision(&manager, contract.id, DecisionInput::renew("2026-06-30"))
            .unwrap();

        let (_, observed) = service
            .review_target(&admin, contract.id, ReviewEvent::SendBack)
            .unwrap();
        service
            .save_progress(
                &manager,
                contract.id,
                DecisionInput::renew("2026-06-30").with_comments("signed copy on its way"),
            )
            .unwrap();

        let err = service
            .commit_send_back(&admin, contract.id, &observed, "Missing signature")
            .unwrap_err();
        assert!(err.is_conflict());

        let update = service.update(observed.id).unwrap();
        assert_eq!(update.status, UpdateStatus::PendingReview);
        assert_eq!(update.returned_reason, None);
        assert_eq!(update.decision_comments.as_deref(), Some("signed copy on its way"));
    }

    #[test]
    fn completion_reads_the_decision_inside_the_transaction() {
        let (_dir, service, contract) = service();
        let manager = ActorContext::manager(MANAGER);
        let admin = ActorContext::admin(ADMIN);
        let submitted = service
            .submit_decision(&manager, contract.id, DecisionInput::renew("2026-06-30"))
            .unwrap();
        let update = service.update(submitted.id).unwrap();

        let contract = service.commit_completion(&admin, contract.id, &update).unwrap();

        assert_eq!(contract.end_date, CalendarDate::from_ymd(2026, 6, 30).unwrap());
        let closed = service.update(update.id).unwrap();
        assert_eq!(closed.status, UpdateStatus::Completed);
        assert_eq!(closed.decision, Some(Decision::Renew));
    }
}
