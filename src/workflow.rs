//! Transition rules of the contract review cycle.
//!
//! ```text
//!   (none) --save--> draft --submit--> pending_review <--submit-- returned
//!   (none) --submit-----------------> pending_review --send back--> returned
//!                     pending_review --submit--> updated
//!          pending_review | updated --complete--> completed
//! ```
//!
//! Everything here is pure; the service applies side effects.
use std::fmt;

use crate::actor::ActorContext;
use crate::config::AuthorizationPolicy;
use crate::contract::Contract;
use crate::error::WorkflowError;
use crate::update::UpdateStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewEvent {
    Submit,
    SaveProgress,
    Complete,
    SendBack,
    ViewHistory,
}

impl ReviewEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewEvent::Submit => "submit a decision",
            ReviewEvent::SaveProgress => "save progress",
            ReviewEvent::Complete => "complete the review",
            ReviewEvent::SendBack => "send the update back",
            ReviewEvent::ViewHistory => "view the review history",
        }
    }
    /// Events only the Contract Admin may raise.
    pub fn is_admin_event(self) -> bool {
        matches!(self, ReviewEvent::Complete | ReviewEvent::SendBack)
    }
}

impl fmt::Display for ReviewEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status the live update moves to when `event` is applied. `current` is the
/// status of the contract's live update, `None` when there is none.
pub fn next_status(
    current: Option<UpdateStatus>,
    event: ReviewEvent,
) -> Result<UpdateStatus, WorkflowError> {
    use ReviewEvent::*;
    use UpdateStatus::*;

    match (current, event) {
        (None | Some(Draft) | Some(Returned), Submit) => Ok(PendingReview),
        // correction submitted before the admin acted
        (Some(PendingReview) | Some(Updated), Submit) => Ok(Updated),
        (None, SaveProgress) => Ok(Draft),
        (Some(status), SaveProgress) if status.is_live() => Ok(status),
        (Some(status), Complete) if status.awaits_admin() => Ok(Completed),
        (Some(status), SendBack) if status.awaits_admin() => Ok(Returned),
        (Some(from), event) => Err(WorkflowError::InvalidTransition { from, event }),
        // admin events with nothing in review are resolved by the caller
        (None, _) => Err(WorkflowError::InvalidTransition {
            from: Completed,
            event,
        }),
    }
}

/// Whether a submit from `current` is a resubmission after a return, which is
/// the only initiator path guarded by the attachment gate.
pub fn is_resubmission(current: Option<UpdateStatus>, event: ReviewEvent) -> bool {
    event == ReviewEvent::Submit && current == Some(UpdateStatus::Returned)
}

/// Admin events need the Contract Admin role. Initiator events need one of the
/// three assigned seats, or the admin role when `policy` allows it. History is
/// open to the admin and the assigned seats.
pub fn authorize(
    actor: &ActorContext,
    contract: &Contract,
    event: ReviewEvent,
    policy: &AuthorizationPolicy,
) -> Result<(), WorkflowError> {
    let assigned = contract.is_assigned(actor.user_id);
    let allowed = match event {
        event if event.is_admin_event() => actor.is_admin(),
        ReviewEvent::ViewHistory => assigned || actor.is_admin(),
        _ => assigned || (actor.is_admin() && policy.admin_may_initiate),
    };

    if allowed {
        Ok(())
    } else {
        Err(WorkflowError::Unauthorized {
            user_id: actor.user_id,
            contract_id: contract.id,
            event,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ContractDetails;
    use crate::types::CalendarDate;

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
    fn submit_paths() {
        use UpdateStatus::*;
        assert_eq!(next_status(None, ReviewEvent::Submit).unwrap(), PendingReview);
        assert_eq!(next_status(Some(Draft), ReviewEvent::Submit).unwrap(), PendingReview);
        assert_eq!(next_status(Some(Returned), ReviewEvent::Submit).unwrap(), PendingReview);
        assert_eq!(next_status(Some(PendingReview), ReviewEvent::Submit).unwrap(), Updated);
        assert!(next_status(Some(Completed), ReviewEvent::Submit).is_err());
    }

    #[test]
    fn admin_cannot_complete_a_draft_or_returned_update() {
        for status in [UpdateStatus::Draft, UpdateStatus::Returned] {
            assert!(matches!(
                next_status(Some(status), ReviewEvent::Complete),
                Err(WorkflowError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn only_admin_completes() {
        let contract = contract();
        let policy = AuthorizationPolicy::default();

        assert!(authorize(&ActorContext::manager(1), &contract, ReviewEvent::Complete, &policy).is_err());
        assert!(authorize(&ActorContext::admin(99), &contract, ReviewEvent::Complete, &policy).is_ok());
    }

    #[test]
    fn admin_initiation_follows_policy() {
        let contract = contract();
        let strict = AuthorizationPolicy::default();
        let lenient = AuthorizationPolicy {
            admin_may_initiate: true,
        };

        let admin = ActorContext::admin(99);
        assert!(authorize(&admin, &contract, ReviewEvent::Submit, &strict).is_err());
        assert!(authorize(&admin, &contract, ReviewEvent::Submit, &lenient).is_ok());
        assert!(authorize(&ActorContext::manager(2), &contract, ReviewEvent::Submit, &strict).is_ok());
        assert!(authorize(&ActorContext::manager(4), &contract, ReviewEvent::SaveProgress, &lenient).is_err());
    }

    #[test]
    fn history_is_open_to_admin_and_seats() {
        let contract = contract();
        let policy = AuthorizationPolicy::default();

        assert!(authorize(&ActorContext::admin(99), &contract, ReviewEvent::ViewHistory, &policy).is_ok());
        assert!(authorize(&ActorContext::manager(3), &contract, ReviewEvent::ViewHistory, &policy).is_ok());
        assert!(authorize(&ActorContext::manager(4), &contract, ReviewEvent::ViewHistory, &policy).is_err());
        assert!(next_status(Some(UpdateStatus::PendingReview), ReviewEvent::ViewHistory).is_err());
    }
}
