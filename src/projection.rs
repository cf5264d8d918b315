//! Read-side projection for worklists. No side effects.
use chrono::Utc;
use std::fmt;

use crate::actor::ActorContext;
use crate::contract::{AssignedRole, Contract};
use crate::types::{CalendarDate, TimeStamp};
use crate::update::{ContractUpdate, Decision, UpdateStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleLabel {
    ContractManager,
    Backup,
    Owner,
    NotApplicable,
}

/// One row of an active worklist, resolved for a particular viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractUpdateView {
    pub update_id: u64,
    pub contract_id: u64,
    pub contract_code: String,
    pub vendor_name: String,
    pub expiration_date: CalendarDate,
    pub status: UpdateStatus,
    pub status_label: String,
    pub my_role: RoleLabel,
    pub decision: Option<Decision>,
    pub decision_comments: Option<String>,
    pub response_provided_by_user_id: Option<u64>,
    pub response_date: Option<TimeStamp<Utc>>,
    pub has_document: bool,
    pub admin_comments: Option<String>,
    pub returned_reason: Option<String>,
    pub returned_date: Option<TimeStamp<Utc>>,
    pub correction_date: Option<TimeStamp<Utc>>,
    pub initial_expiration_date: Option<CalendarDate>,
    pub previous_update_id: Option<u64>,
}

impl RoleLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            RoleLabel::ContractManager => "Contract Manager",
            RoleLabel::Backup => "Backup",
            RoleLabel::Owner => "Owner",
            RoleLabel::NotApplicable => "N/A",
        }
    }
}

impl From<Option<AssignedRole>> for RoleLabel {
    fn from(role: Option<AssignedRole>) -> Self {
        match role {
            Some(AssignedRole::Manager) => RoleLabel::ContractManager,
            Some(AssignedRole::Backup) => RoleLabel::Backup,
            Some(AssignedRole::Owner) => RoleLabel::Owner,
            None => RoleLabel::NotApplicable,
        }
    }
}

impl fmt::Display for RoleLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label shown in the status column. The admin sees `pending_review` as work
/// to review; the submitter sees it as their update.
pub fn status_label(status: UpdateStatus, viewer: &ActorContext) -> &'static str {
    match status {
        UpdateStatus::PendingReview if viewer.is_admin() => "Review",
        UpdateStatus::PendingReview => "Updated",
        other => other.as_str(),
    }
}

pub fn my_role(viewer_id: u64, contract: &Contract) -> RoleLabel {
    contract.assigned_role(viewer_id).into()
}

/// "My role" column for an update. An admin viewing an answered update sees
/// the seat of whoever answered instead of their own.
pub fn role_for_update(viewer: &ActorContext, contract: &Contract, update: &ContractUpdate) -> RoleLabel {
    match update.response_provided_by_user_id {
        Some(responder) if viewer.is_admin() => my_role(responder, contract),
        _ => my_role(viewer.user_id, contract),
    }
}

/// Admins see every live update; everyone else only contracts they hold a seat on.
pub fn is_visible(viewer: &ActorContext, contract: &Contract) -> bool {
    viewer.is_admin() || contract.is_assigned(viewer.user_id)
}

impl ContractUpdateView {
    pub fn project(viewer: &ActorContext, contract: &Contract, update: &ContractUpdate) -> Self {
        Self {
            update_id: update.id,
            contract_id: contract.id,
            contract_code: contract.code.clone(),
            vendor_name: contract.vendor_name.clone(),
            expiration_date: contract.end_date,
            status: update.status,
            status_label: status_label(update.status, viewer).to_string(),
            my_role: role_for_update(viewer, contract, update),
            decision: update.decision,
            decision_comments: update.decision_comments.clone(),
            response_provided_by_user_id: update.response_provided_by_user_id,
            response_date: update.response_date.clone(),
            has_document: update.has_document,
            admin_comments: update.admin_comments.clone(),
            returned_reason: update.returned_reason.clone(),
            returned_date: update.returned_date.clone(),
            correction_date: update.correction_date.clone(),
            initial_expiration_date: update.initial_expiration_date,
            previous_update_id: update.previous_update_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ContractDetails;

    fn contract() -> Contract {
        ContractDetails::new("CT1")
            .set_end_date(CalendarDate::from_ymd(2025, 12, 31).unwrap())
            .set_owner(1)
            .set_backup(2)
            .set_owner_manager(3)
            .finalise(10)
            .unwrap()
    }

    #[test]
    fn pending_review_label_depends_on_viewer() {
        assert_eq!(status_label(UpdateStatus::PendingReview, &ActorContext::admin(9)), "Review");
        assert_eq!(status_label(UpdateStatus::PendingReview, &ActorContext::manager(1)), "Updated");
        assert_eq!(status_label(UpdateStatus::Returned, &ActorContext::admin(9)), "returned");
        assert_eq!(status_label(UpdateStatus::Updated, &ActorContext::manager(1)), "updated");
    }

    #[test]
    fn admin_sees_the_responders_seat() {
        let contract = contract();
        let mut update = ContractUpdate::new(1, contract.id, UpdateStatus::PendingReview);

        assert_eq!(role_for_update(&ActorContext::admin(9), &contract, &update), RoleLabel::NotApplicable);

        update.response_provided_by_user_id = Some(2);
        assert_eq!(role_for_update(&ActorContext::admin(9), &contract, &update), RoleLabel::Backup);
        assert_eq!(role_for_update(&ActorContext::manager(3), &contract, &update), RoleLabel::Owner);
    }
}
