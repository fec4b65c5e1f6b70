//! Authorization primitives for the supply-chain dashboard.
//!
//! Everything outside [`delegate`] is synchronous and total: role parsing
//! degrades to [`Role::Viewer`] instead of failing, and the permission
//! catalog has no I/O. Facility-scoped and conditional questions go through
//! the [`delegate`], whose answers come from the store.

pub mod checks;
pub mod conditions;
pub mod delegate;
pub mod guard;
pub mod hierarchy;
pub mod permissions;
pub mod role;
pub mod rpc;

use thiserror::Error;

pub use checks::{Route, Subject};
pub use conditions::{AccessContext, Conditions, TimeWindow};
pub use delegate::{AuthorizationDelegate, Decision, DelegateConfig, DelegateError, Outcome};
pub use guard::{GuardMode, GuardVerdict, RoleGuard};
pub use hierarchy::{ROLE_HIERARCHY, has_higher_or_equal_rank, outranks, rank};
pub use permissions::{Capability, EnhancedPermissions, PermissionSet, base_permissions, enhance};
pub use role::{Role, RoleCode};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("unknown role {0}")]
    UnknownRole(String),
    #[error("unknown capability {0}")]
    UnknownCapability(String),
    #[error("role {assigner} may not assign {target}")]
    AssignmentDenied { assigner: Role, target: Role },
}
