//! Contract records consumed and mutated by the review workflow
use chrono::Utc;

use crate::error::ValidationError;
use crate::types::{CalendarDate, TimeStamp};

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractStatus {
    #[n(0)]
    Active,
    #[n(1)]
    Expired,
    #[n(2)]
    Terminated,
    #[n(3)]
    PendingTermination,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationFlag {
    #[n(0)]
    Yes,
    #[n(1)]
    No,
}

// which of the three assigned seats a user holds on a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignedRole {
    Manager,
    Backup,
    Owner,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct ContractDocument {
    #[n(0)]
    pub id: String, // bech32 "doc_" id
    #[n(1)]
    pub file_name: String,
    #[n(2)]
    pub custom_document_name: String,
    #[n(3)]
    pub document_signed_date: CalendarDate,
    #[n(4)]
    pub file_path: String, // reference into the document store
    #[n(5)]
    pub file_size: u64,
    #[n(6)]
    pub content_type: String,
    #[n(7)]
    pub created_at: TimeStamp<Utc>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct TerminationDocument {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub file_name: String,
    #[n(2)]
    pub document_name: String,
    #[n(3)]
    pub document_date: CalendarDate,
    #[n(4)]
    pub file_path: String,
    #[n(5)]
    pub file_size: u64,
    #[n(6)]
    pub content_type: String,
    #[n(7)]
    pub created_at: TimeStamp<Utc>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    #[n(0)]
    pub id: u64,
    #[n(1)]
    pub code: String, // human readable, e.g. "CT12"
    #[n(2)]
    pub vendor_name: String,
    #[n(3)]
    pub contract_type: String,
    #[n(4)]
    pub description: String,
    #[n(5)]
    pub end_date: CalendarDate,
    #[n(6)]
    pub status: ContractStatus,
    #[n(7)]
    pub contract_termination: Option<TerminationFlag>,
    #[n(8)]
    pub owner_id: u64, // Contract Manager
    #[n(9)]
    pub backup_id: u64,
    #[n(10)]
    pub owner_manager_id: u64, // Owner
    #[n(11)]
    pub documents: Vec<ContractDocument>,
    #[n(12)]
    pub termination_documents: Vec<TerminationDocument>,
    #[n(13)]
    pub last_modified_by: Option<u64>,
    #[n(14)]
    pub last_modified_date: Option<TimeStamp<Utc>>,
    #[n(15)]
    pub live_update_id: Option<u64>,
    #[n(16)]
    pub created_at: TimeStamp<Utc>,
}

/// Draft of a contract before it is registered with the store.
#[derive(Debug, Default, Clone)]
pub struct ContractDetails {
    code: Option<String>,
    vendor_name: String,
    contract_type: String,
    description: String,
    end_date: Option<CalendarDate>,
    status: Option<ContractStatus>,
    owner_id: Option<u64>,
    backup_id: Option<u64>,
    owner_manager_id: Option<u64>,
}

impl ContractStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ContractStatus::Active => "Active",
            ContractStatus::Expired => "Expired",
            ContractStatus::Terminated => "Terminated",
            ContractStatus::PendingTermination => "Pending Termination",
        }
    }
}

impl TerminationFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            TerminationFlag::Yes => "Yes",
            TerminationFlag::No => "No",
        }
    }
}

impl Contract {
    /// Seat held by `user_id`. The Contract Manager seat wins when one user
    /// holds several.
    pub fn assigned_role(&self, user_id: u64) -> Option<AssignedRole> {
        if self.owner_id == user_id {
            Some(AssignedRole::Manager)
        } else if self.backup_id == user_id {
            Some(AssignedRole::Backup)
        } else if self.owner_manager_id == user_id {
            Some(AssignedRole::Owner)
        } else {
            None
        }
    }
    pub fn is_assigned(&self, user_id: u64) -> bool {
        self.assigned_role(user_id).is_some()
    }
    /// Terminated contracts take no further decisions.
    pub fn ensure_open(&self) -> Result<(), ValidationError> {
        if self.status == ContractStatus::Terminated {
            return Err(ValidationError::AlreadyTerminated(self.code.clone()));
        }
        Ok(())
    }
    pub fn has_termination_document(&self) -> bool {
        !self.termination_documents.is_empty()
    }
    /// Every document-store reference this contract points at.
    pub fn document_references(&self) -> impl Iterator<Item = &str> {
        self.documents
            .iter()
            .map(|doc| doc.file_path.as_str())
            .chain(
                self.termination_documents
                    .iter()
                    .map(|doc| doc.file_path.as_str()),
            )
    }
    pub(crate) fn touch(&mut self, user_id: u64) {
        self.last_modified_by = Some(user_id);
        self.last_modified_date = Some(TimeStamp::new());
    }
}

impl ContractDetails {
    /// Construct a new builder object, this becomes the basis for a registered contract
    pub fn new(code: &str) -> Self {
        Self {
            code: Some(code.to_string()),
            ..Self::default()
        }
    }
    pub fn set_vendor_name(mut self, vendor_name: &str) -> Self {
        self.vendor_name = vendor_name.to_string();
        self
    }
    pub fn set_contract_type(mut self, contract_type: &str) -> Self {
        self.contract_type = contract_type.to_string();
        self
    }
    pub fn set_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
    pub fn set_end_date(mut self, end_date: CalendarDate) -> Self {
        self.end_date = Some(end_date);
        self
    }
    pub fn set_status(mut self, status: ContractStatus) -> Self {
        self.status = Some(status);
        self
    }
    pub fn set_owner(mut self, user_id: u64) -> Self {
        self.owner_id = Some(user_id);
        self
    }
    pub fn set_backup(mut self, user_id: u64) -> Self {
        self.backup_id = Some(user_id);
        self
    }
    pub fn set_owner_manager(mut self, user_id: u64) -> Self {
        self.owner_manager_id = Some(user_id);
        self
    }
    // Checks required fields and produces the record stored under `id`
    pub fn finalise(self, id: u64) -> Result<Contract, ValidationError> {
        let code = self
            .code
            .filter(|code| !code.trim().is_empty())
            .ok_or(ValidationError::MissingField("code"))?;
        let end_date = self.end_date.ok_or(ValidationError::MissingField("end_date"))?;
        let owner_id = self.owner_id.ok_or(ValidationError::MissingField("owner"))?;
        let backup_id = self.backup_id.ok_or(ValidationError::MissingField("backup"))?;
        let owner_manager_id = self
            .owner_manager_id
            .ok_or(ValidationError::MissingField("owner_manager"))?;

        Ok(Contract {
            id,
            code,
            vendor_name: self.vendor_name,
            contract_type: self.contract_type,
            description: self.description,
            end_date,
            status: self.status.unwrap_or(ContractStatus::Active),
            contract_termination: None,
            owner_id,
            backup_id,
            owner_manager_id,
            documents: vec![],
            termination_documents: vec![],
            last_modified_by: None,
            last_modified_date: None,
            live_update_id: None,
            created_at: TimeStamp::new(),
        })
    }
}
