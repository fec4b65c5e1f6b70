use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::hierarchy::has_higher_or_equal_rank;
use crate::{Role, Subject};

/// How a [`RoleGuard`] reacts when a subject falls short of the minimum role.
///
/// `AuditOnly` keeps legacy routes reachable while recording every miss, so
/// the two modes must stay distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardMode {
    #[default]
    Enforcing,
    AuditOnly,
}

impl FromStr for GuardMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "enforcing" | "enforce" => Ok(GuardMode::Enforcing),
            "audit_only" | "audit" => Ok(GuardMode::AuditOnly),
            other => Err(format!("unknown guard mode {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardVerdict {
    Granted,
    Denied,
    /// The check failed but the guard runs in audit-only mode.
    PassedThrough,
}

impl GuardVerdict {
    pub fn permits(self) -> bool {
        matches!(self, GuardVerdict::Granted | GuardVerdict::PassedThrough)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RoleGuard {
    pub minimum: Role,
    pub mode: GuardMode,
}

impl RoleGuard {
    pub fn enforcing(minimum: Role) -> Self {
        Self {
            minimum,
            mode: GuardMode::Enforcing,
        }
    }

    pub fn with_mode(minimum: Role, mode: GuardMode) -> Self {
        Self { minimum, mode }
    }

    pub fn check(&self, subject: &Subject) -> GuardVerdict {
        if has_higher_or_equal_rank(subject.role, self.minimum) {
            return GuardVerdict::Granted;
        }
        match self.mode {
            GuardMode::Enforcing => GuardVerdict::Denied,
            GuardMode::AuditOnly => {
                warn!(
                    user_id = %subject.user_id,
                    role = %subject.role,
                    required = %self.minimum,
                    "role guard failed; allowing in audit-only mode"
                );
                GuardVerdict::PassedThrough
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn subject(role: Role) -> Subject {
        Subject::new(Uuid::new_v4(), role)
    }

    #[test]
    fn enforcing_denies_juniors() {
        let guard = RoleGuard::enforcing(Role::Zonal);
        assert_eq!(guard.check(&subject(Role::Regional)), GuardVerdict::Granted);
        assert_eq!(guard.check(&subject(Role::Zonal)), GuardVerdict::Granted);
        assert_eq!(guard.check(&subject(Role::Finance)), GuardVerdict::Denied);
        assert!(!GuardVerdict::Denied.permits());
    }

    #[test]
    fn audit_only_passes_through() {
        let guard = RoleGuard::with_mode(Role::Zonal, GuardMode::AuditOnly);
        let verdict = guard.check(&subject(Role::Viewer));
        assert_eq!(verdict, GuardVerdict::PassedThrough);
        assert!(verdict.permits());
        assert_eq!(guard.check(&subject(Role::National)), GuardVerdict::Granted);
    }

    #[test]
    fn modes_parse_from_config_strings() {
        assert_eq!("audit-only".parse::<GuardMode>(), Ok(GuardMode::AuditOnly));
        assert_eq!("ENFORCING".parse::<GuardMode>(), Ok(GuardMode::Enforcing));
        assert!("lenient".parse::<GuardMode>().is_err());
        assert_eq!(GuardMode::default(), GuardMode::Enforcing);
    }
}
