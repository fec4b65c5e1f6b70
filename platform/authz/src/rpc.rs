//! Payloads exchanged with the store's `/rpc/*` endpoints.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AccessContext, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Procedure {
    HasNationalUsers,
    GetEffectiveRoleForFacility,
    CheckConditionalPermissions,
    LogPermissionUsage,
    AssignFacilityRole,
    RevokeFacilityRole,
}

impl Procedure {
    pub const ALL: [Procedure; 6] = [
        Procedure::HasNationalUsers,
        Procedure::GetEffectiveRoleForFacility,
        Procedure::CheckConditionalPermissions,
        Procedure::LogPermissionUsage,
        Procedure::AssignFacilityRole,
        Procedure::RevokeFacilityRole,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|procedure| procedure.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Procedure::HasNationalUsers => "has_national_users",
            Procedure::GetEffectiveRoleForFacility => "get_effective_role_for_facility",
            Procedure::CheckConditionalPermissions => "check_conditional_permissions",
            Procedure::LogPermissionUsage => "log_permission_usage",
            Procedure::AssignFacilityRole => "assign_facility_role",
            Procedure::RevokeFacilityRole => "revoke_facility_role",
        }
    }

    /// Mutating procedures are never retried by the delegate.
    pub fn is_idempotent(self) -> bool {
        !matches!(
            self,
            Procedure::AssignFacilityRole | Procedure::RevokeFacilityRole
        )
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveRoleRequest {
    pub user_id: Uuid,
    pub facility_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalPermissionRequest {
    pub user_id: Uuid,
    pub facility_id: Uuid,
    pub permission_name: String,
    pub context: AccessContext,
}

/// How a permission decision was reached, recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckMethod {
    RoleBased,
    FacilityRole,
    Conditional,
    Guard,
}

impl CheckMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckMethod::RoleBased => "role_based",
            CheckMethod::FacilityRole => "facility_role",
            CheckMethod::Conditional => "conditional",
            CheckMethod::Guard => "guard",
        }
    }
}

/// One audited permission decision. `id` is chosen by the sender so that a
/// resent write lands on the same row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionUsage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub user_id: Uuid,
    pub permission_name: String,
    pub resource_type: String,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub facility_id: Option<Uuid>,
    pub granted: bool,
    pub method: CheckMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilityRoleRequest {
    pub user_id: Uuid,
    pub facility_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilityRoleRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub facility_id: Uuid,
    pub role: Role,
    pub granted_by: Option<Uuid>,
    pub is_active: bool,
    pub granted_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse<T> {
    pub result: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorBody {
    pub error: RpcErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorDetail {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn procedure_names_round_trip() {
        for procedure in Procedure::ALL {
            assert_eq!(Procedure::from_name(procedure.name()), Some(procedure));
        }
        assert_eq!(Procedure::from_name("drop_tables"), None);
    }

    #[test]
    fn only_grant_changes_are_non_idempotent() {
        let mutating: Vec<_> = Procedure::ALL
            .into_iter()
            .filter(|procedure| !procedure.is_idempotent())
            .collect();
        assert_eq!(
            mutating,
            vec![Procedure::AssignFacilityRole, Procedure::RevokeFacilityRole]
        );
    }

    #[test]
    fn usage_optional_fields_default() {
        let usage: PermissionUsage = serde_json::from_value(json!({
            "user_id": Uuid::nil(),
            "permission_name": "export_data",
            "resource_type": "report",
            "granted": true,
            "method": "role_based"
        }))
        .unwrap();
        assert_eq!(usage.id, None);
        assert_eq!(usage.resource_id, None);
        assert_eq!(usage.method, CheckMethod::RoleBased);
    }
}
