//! Who is acting on a contract.
//!
//! The request boundary resolves the authenticated user into an [`ActorContext`]
//! once; every workflow operation receives it explicitly.
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserRole {
    ContractAdmin,
    ContractManager,
    ContractManagerBackup,
    ContractManagerOwner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorContext {
    pub user_id: u64,
    pub role: UserRole,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::ContractAdmin => "Contract Admin",
            UserRole::ContractManager => "Contract Manager",
            UserRole::ContractManagerBackup => "Contract Manager Backup",
            UserRole::ContractManagerOwner => "Contract Manager Owner",
        }
    }
}

impl ActorContext {
    pub fn new(user_id: u64, role: UserRole) -> Self {
        Self { user_id, role }
    }
    pub fn admin(user_id: u64) -> Self {
        Self::new(user_id, UserRole::ContractAdmin)
    }
    pub fn manager(user_id: u64) -> Self {
        Self::new(user_id, UserRole::ContractManager)
    }
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::ContractAdmin
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "contract admin" => Ok(UserRole::ContractAdmin),
            "contract manager" => Ok(UserRole::ContractManager),
            "contract manager backup" => Ok(UserRole::ContractManagerBackup),
            "contract manager owner" => Ok(UserRole::ContractManagerOwner),
            _ => Err(ValidationError::UnknownRole(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_parse_from_legacy_labels() {
        for role in [
            UserRole::ContractAdmin,
            UserRole::ContractManager,
            UserRole::ContractManagerBackup,
            UserRole::ContractManagerOwner,
        ] {
            assert_eq!(role.as_str().parse::<UserRole>(), Ok(role));
        }
        assert!("Auditor".parse::<UserRole>().is_err());
    }
}
