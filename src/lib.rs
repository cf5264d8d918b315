//! Renewal and termination review of contracts.
//!
//! A contract's Manager, Backup or Owner records a decision (Renew or
//! Terminate), the Contract Admin completes it or sends it back, and the
//! outcome is applied to the contract in the same transaction that closes the
//! review. [`service::ReviewService`] is the entry point.

pub mod actor;
pub mod config;
pub mod contract;
pub mod documents;
pub mod error;
pub mod gate;
pub mod projection;
pub mod service;
pub mod store;
pub mod types;
pub mod update;
pub mod utils;
pub mod workflow;

pub use actor::{ActorContext, UserRole};
pub use config::{AuthorizationPolicy, WorkflowConfig};
pub use contract::{Contract, ContractDetails, ContractStatus, TerminationFlag};
pub use documents::{DocumentStore, DocumentUpload, FsDocumentStore};
pub use error::{ValidationError, WorkflowError};
pub use service::{DecisionInput, ReviewService};
pub use update::{ContractUpdate, Decision, UpdateStatus};
