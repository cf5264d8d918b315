//! Runtime configuration, loaded from TOML.
//!
//! ```toml
//! database_path = "/var/lib/contract-review/db"
//! document_root = "/var/lib/contract-review/documents"
//! orphan_grace_secs = 86400
//!
//! [authorization]
//! admin_may_initiate = true
//! ```
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Unreferenced documents younger than this are left alone by the sweep.
pub const DEFAULT_ORPHAN_GRACE_SECS: u64 = 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub database_path: PathBuf,
    pub document_root: PathBuf,
    pub orphan_grace_secs: u64,
    pub authorization: AuthorizationPolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthorizationPolicy {
    /// Lets a Contract Admin who holds no seat on a contract submit or save a
    /// decision on it, as the "requires attention" list does.
    pub admin_may_initiate: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("contract-review.db"),
            document_root: PathBuf::from("documents"),
            orphan_grace_secs: DEFAULT_ORPHAN_GRACE_SECS,
            authorization: AuthorizationPolicy::default(),
        }
    }
}

impl WorkflowConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
    pub fn orphan_grace(&self) -> Duration {
        Duration::from_secs(self.orphan_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = WorkflowConfig::from_toml_str("").unwrap();
        assert_eq!(config, WorkflowConfig::default());
        assert!(!config.authorization.admin_may_initiate);
        assert_eq!(config.orphan_grace(), Duration::from_secs(3600));
    }

    #[test]
    fn reads_authorization_table() {
        let config = WorkflowConfig::from_toml_str(
            r#"
            document_root = "/tmp/docs"
            orphan_grace_secs = 0

            [authorization]
            admin_may_initiate = true
            "#,
        )
        .unwrap();

        assert_eq!(config.document_root, PathBuf::from("/tmp/docs"));
        assert_eq!(config.database_path, PathBuf::from("contract-review.db"));
        assert!(config.authorization.admin_may_initiate);
        assert_eq!(config.orphan_grace(), Duration::ZERO);
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(WorkflowConfig::from_toml_str("database_path = 3").is_err());
    }
}
