//! The per-cycle review record attached to a contract
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::types::{CalendarDate, TimeStamp};

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateStatus {
    #[n(0)]
    Draft,
    #[n(1)]
    PendingReview,
    #[n(2)]
    Returned,
    #[n(3)]
    Updated,
    #[n(4)]
    Completed,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    #[n(0)]
    Renew,
    #[n(1)]
    Terminate,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct ContractUpdate {
    #[n(0)]
    pub id: u64,
    #[n(1)]
    pub contract_id: u64,
    #[n(2)]
    pub status: UpdateStatus,
    #[n(3)]
    pub decision: Option<Decision>,
    #[n(4)]
    pub decision_comments: Option<String>,
    #[n(5)]
    pub response_provided_by_user_id: Option<u64>,
    #[n(6)]
    pub response_date: Option<TimeStamp<Utc>>,
    #[n(7)]
    pub has_document: bool,
    #[n(8)]
    pub admin_comments: Option<String>,
    #[n(9)]
    pub returned_reason: Option<String>,
    #[n(10)]
    pub returned_date: Option<TimeStamp<Utc>>,
    #[n(11)]
    pub initial_expiration_date: Option<CalendarDate>, // staged renewal end date
    #[n(12)]
    pub initial_vendor_name: Option<String>,
    #[n(13)]
    pub initial_contract_type: Option<String>,
    #[n(14)]
    pub initial_description: Option<String>,
    #[n(15)]
    pub previous_update_id: Option<u64>,
    #[n(16)]
    pub correction_date: Option<TimeStamp<Utc>>,
    #[n(17)]
    pub created_at: TimeStamp<Utc>,
    #[n(18)]
    pub updated_at: TimeStamp<Utc>,
}

impl UpdateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateStatus::Draft => "draft",
            UpdateStatus::PendingReview => "pending_review",
            UpdateStatus::Returned => "returned",
            UpdateStatus::Updated => "updated",
            UpdateStatus::Completed => "completed",
        }
    }
    /// Anything short of `completed` is the contract's live update.
    pub fn is_live(self) -> bool {
        self != UpdateStatus::Completed
    }
    /// States the Contract Admin can complete or send back.
    pub fn awaits_admin(self) -> bool {
        matches!(self, UpdateStatus::PendingReview | UpdateStatus::Updated)
    }
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Renew => "Renew",
            Decision::Terminate => "Terminate",
        }
    }
}

impl ContractUpdate {
    pub fn new(id: u64, contract_id: u64, status: UpdateStatus) -> Self {
        let now = TimeStamp::new();
        Self {
            id,
            contract_id,
            status,
            decision: None,
            decision_comments: None,
            response_provided_by_user_id: None,
            response_date: None,
            has_document: false,
            admin_comments: None,
            returned_reason: None,
            returned_date: None,
            initial_expiration_date: None,
            initial_vendor_name: None,
            initial_contract_type: None,
            initial_description: None,
            previous_update_id: None,
            correction_date: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }
    pub fn set_previous_update(mut self, previous_update_id: Option<u64>) -> Self {
        self.previous_update_id = previous_update_id;
        self
    }
    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }
    /// Orders updates by creation time, id breaking ties.
    pub fn recency_key(&self) -> (DateTime<Utc>, u64) {
        (self.created_at.to_datetime_utc(), self.id)
    }
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// "Extend" is the legacy spelling of Renew
impl FromStr for Decision {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "renew" | "extend" => Ok(Decision::Renew),
            "terminate" => Ok(Decision::Terminate),
            "" => Err(ValidationError::MissingDecision),
            _ => Err(ValidationError::UnknownDecision(s.to_string())),
        }
    }
}

impl FromStr for UpdateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(UpdateStatus::Draft),
            "pending_review" => Ok(UpdateStatus::PendingReview),
            "returned" => Ok(UpdateStatus::Returned),
            "updated" => Ok(UpdateStatus::Updated),
            "completed" => Ok(UpdateStatus::Completed),
            other => Err(format!("unknown update status '{other}'")),
        }
    }
}
