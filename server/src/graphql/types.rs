use async_graphql::{Enum, ID, SimpleObject};
use chrono::{DateTime, Utc};
use entity::{facility, permission_audit_log, product, role_audit_log, user};
use platform_authz::checks::{assignable_roles, navigation};
use platform_authz::permissions::permissions_for;
use platform_authz::rpc::FacilityRoleRecord;
use platform_authz::{EnhancedPermissions, Role};

#[derive(Enum, Copy, Clone, Eq, PartialEq, Debug)]
#[graphql(name = "Role")]
pub enum RoleName {
    National,
    Regional,
    Zonal,
    FacilityManager,
    FacilityOfficer,
    Procurement,
    Finance,
    ProgramManager,
    Qa,
    DataAnalyst,
    Viewer,
}

impl From<Role> for RoleName {
    fn from(value: Role) -> Self {
        match value {
            Role::National => RoleName::National,
            Role::Regional => RoleName::Regional,
            Role::Zonal => RoleName::Zonal,
            Role::FacilityManager => RoleName::FacilityManager,
            Role::FacilityOfficer => RoleName::FacilityOfficer,
            Role::Procurement => RoleName::Procurement,
            Role::Finance => RoleName::Finance,
            Role::ProgramManager => RoleName::ProgramManager,
            Role::Qa => RoleName::Qa,
            Role::DataAnalyst => RoleName::DataAnalyst,
            Role::Viewer => RoleName::Viewer,
        }
    }
}

impl From<RoleName> for Role {
    fn from(value: RoleName) -> Self {
        match value {
            RoleName::National => Role::National,
            RoleName::Regional => Role::Regional,
            RoleName::Zonal => Role::Zonal,
            RoleName::FacilityManager => Role::FacilityManager,
            RoleName::FacilityOfficer => Role::FacilityOfficer,
            RoleName::Procurement => Role::Procurement,
            RoleName::Finance => Role::Finance,
            RoleName::ProgramManager => Role::ProgramManager,
            RoleName::Qa => Role::Qa,
            RoleName::DataAnalyst => Role::DataAnalyst,
            RoleName::Viewer => Role::Viewer,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct PermissionsNode {
    pub can_view_products: bool,
    pub can_create_products: bool,
    pub can_edit_products: bool,
    pub can_delete_products: bool,
    pub can_view_facilities: bool,
    pub can_import_data: bool,
    pub can_export_data: bool,
    pub can_view_analytics: bool,
    pub can_manage_users: bool,
    pub can_manage_system: bool,
    pub can_manage_roles: bool,
    pub can_approve_associations: bool,
    pub can_view_audit_logs: bool,
    pub has_admin_access: bool,
    pub has_regional_access: bool,
    pub has_national_access: bool,
    pub can_create_facilities: bool,
    pub can_manage_facility_staff: bool,
    pub can_export_sensitive_data: bool,
    pub can_approve_procurement: bool,
}

impl From<EnhancedPermissions> for PermissionsNode {
    fn from(value: EnhancedPermissions) -> Self {
        let base = value.base;
        Self {
            can_view_products: base.can_view_products,
            can_create_products: base.can_create_products,
            can_edit_products: base.can_edit_products,
            can_delete_products: base.can_delete_products,
            can_view_facilities: base.can_view_facilities,
            can_import_data: base.can_import_data,
            can_export_data: base.can_export_data,
            can_view_analytics: base.can_view_analytics,
            can_manage_users: base.can_manage_users,
            can_manage_system: base.can_manage_system,
            can_manage_roles: base.can_manage_roles,
            can_approve_associations: base.can_approve_associations,
            can_view_audit_logs: base.can_view_audit_logs,
            has_admin_access: value.has_admin_access,
            has_regional_access: value.has_regional_access,
            has_national_access: value.has_national_access,
            can_create_facilities: value.can_create_facilities,
            can_manage_facility_staff: value.can_manage_facility_staff,
            can_export_sensitive_data: value.can_export_sensitive_data,
            can_approve_procurement: value.can_approve_procurement,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct MeNode {
    pub id: ID,
    pub email: String,
    pub display_name: String,
    pub role: RoleName,
    pub role_label: String,
    pub facility_id: Option<ID>,
    pub permissions: PermissionsNode,
    /// Dashboard paths the role may open.
    pub navigation: Vec<String>,
    pub assignable_roles: Vec<RoleName>,
}

impl MeNode {
    pub fn from_model(model: user::Model) -> Self {
        let role = Role::from_external(&model.role_code);
        Self {
            id: ID(model.id.to_string()),
            email: model.email,
            display_name: model.display_name,
            role: role.into(),
            role_label: role.label().to_string(),
            facility_id: model.facility_id.map(|id| ID(id.to_string())),
            permissions: permissions_for(role).into(),
            navigation: navigation(role)
                .into_iter()
                .map(|route| route.path().to_string())
                .collect(),
            assignable_roles: assignable_roles(role)
                .into_iter()
                .map(RoleName::from)
                .collect(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct FacilityNode {
    pub id: ID,
    pub code: String,
    pub name: String,
    pub region: String,
    pub zone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<facility::Model> for FacilityNode {
    fn from(value: facility::Model) -> Self {
        Self {
            id: ID(value.id.to_string()),
            code: value.code,
            name: value.name,
            region: value.region,
            zone: value.zone,
            created_at: value.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct ProductNode {
    pub id: ID,
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub unit_cost_cents: i64,
    pub updated_at: DateTime<Utc>,
}

impl From<product::Model> for ProductNode {
    fn from(value: product::Model) -> Self {
        Self {
            id: ID(value.id.to_string()),
            sku: value.sku,
            name: value.name,
            category: value.category,
            unit_cost_cents: value.unit_cost_cents,
            updated_at: value.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct FacilityRoleNode {
    pub id: ID,
    pub user_id: ID,
    pub facility_id: ID,
    pub role: RoleName,
    pub granted_by: Option<ID>,
    pub is_active: bool,
    pub granted_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl From<FacilityRoleRecord> for FacilityRoleNode {
    fn from(value: FacilityRoleRecord) -> Self {
        Self {
            id: ID(value.id.to_string()),
            user_id: ID(value.user_id.to_string()),
            facility_id: ID(value.facility_id.to_string()),
            role: value.role.into(),
            granted_by: value.granted_by.map(|id| ID(id.to_string())),
            is_active: value.is_active,
            granted_at: value.granted_at,
            revoked_at: value.revoked_at,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct PermissionUsageNode {
    pub id: ID,
    pub user_id: ID,
    pub permission_name: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub facility_id: Option<ID>,
    pub granted: bool,
    pub method: String,
    pub created_at: DateTime<Utc>,
}

impl From<permission_audit_log::Model> for PermissionUsageNode {
    fn from(value: permission_audit_log::Model) -> Self {
        Self {
            id: ID(value.id.to_string()),
            user_id: ID(value.user_id.to_string()),
            permission_name: value.permission_name,
            resource_type: value.resource_type,
            resource_id: value.resource_id,
            facility_id: value.facility_id.map(|id| ID(id.to_string())),
            granted: value.granted,
            method: value.method,
            created_at: value.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct RoleChangeNode {
    pub id: ID,
    pub actor_id: ID,
    pub facility_id: ID,
    pub role: RoleName,
    pub action: String,
    pub created_at: DateTime<Utc>,
}

impl From<role_audit_log::Model> for RoleChangeNode {
    fn from(value: role_audit_log::Model) -> Self {
        let action = match value.action {
            role_audit_log::Action::Grant => "GRANT",
            role_audit_log::Action::Regrant => "REGRANT",
            role_audit_log::Action::Revoke => "REVOKE",
        };
        Self {
            id: ID(value.id.to_string()),
            actor_id: ID(value.actor_id.to_string()),
            facility_id: ID(value.facility_id.to_string()),
            role: Role::from_external(&value.role_code).into(),
            action: action.to_string(),
            created_at: value.created_at.with_timezone(&Utc),
        }
    }
}
