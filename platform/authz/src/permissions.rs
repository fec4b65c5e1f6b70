//! Static role → capability catalog and the derived flags computed on top of it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::hierarchy::has_higher_or_equal_rank;
use crate::{AuthzError, Role};

/// Named capabilities. Mirrors the fields of [`PermissionSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewProducts,
    CreateProducts,
    EditProducts,
    DeleteProducts,
    ViewFacilities,
    ImportData,
    ExportData,
    ViewAnalytics,
    ManageUsers,
    ManageSystem,
    ManageRoles,
    ApproveAssociations,
    ViewAuditLogs,
}

impl Capability {
    pub const ALL: [Capability; 13] = [
        Capability::ViewProducts,
        Capability::CreateProducts,
        Capability::EditProducts,
        Capability::DeleteProducts,
        Capability::ViewFacilities,
        Capability::ImportData,
        Capability::ExportData,
        Capability::ViewAnalytics,
        Capability::ManageUsers,
        Capability::ManageSystem,
        Capability::ManageRoles,
        Capability::ApproveAssociations,
        Capability::ViewAuditLogs,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::ViewProducts => "view_products",
            Capability::CreateProducts => "create_products",
            Capability::EditProducts => "edit_products",
            Capability::DeleteProducts => "delete_products",
            Capability::ViewFacilities => "view_facilities",
            Capability::ImportData => "import_data",
            Capability::ExportData => "export_data",
            Capability::ViewAnalytics => "view_analytics",
            Capability::ManageUsers => "manage_users",
            Capability::ManageSystem => "manage_system",
            Capability::ManageRoles => "manage_roles",
            Capability::ApproveAssociations => "approve_associations",
            Capability::ViewAuditLogs => "view_audit_logs",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        let normalized = normalized.strip_prefix("can_").unwrap_or(&normalized);
        Capability::ALL
            .into_iter()
            .find(|cap| cap.as_str() == normalized)
            .ok_or_else(|| AuthzError::UnknownCapability(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionSet {
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
}

impl PermissionSet {
    /// The restrictive set: read-only access to products and facilities.
    pub const fn viewer() -> Self {
        Self {
            can_view_products: true,
            can_create_products: false,
            can_edit_products: false,
            can_delete_products: false,
            can_view_facilities: true,
            can_import_data: false,
            can_export_data: false,
            can_view_analytics: false,
            can_manage_users: false,
            can_manage_system: false,
            can_manage_roles: false,
            can_approve_associations: false,
            can_view_audit_logs: false,
        }
    }

    const fn all() -> Self {
        Self {
            can_view_products: true,
            can_create_products: true,
            can_edit_products: true,
            can_delete_products: true,
            can_view_facilities: true,
            can_import_data: true,
            can_export_data: true,
            can_view_analytics: true,
            can_manage_users: true,
            can_manage_system: true,
            can_manage_roles: true,
            can_approve_associations: true,
            can_view_audit_logs: true,
        }
    }

    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::ViewProducts => self.can_view_products,
            Capability::CreateProducts => self.can_create_products,
            Capability::EditProducts => self.can_edit_products,
            Capability::DeleteProducts => self.can_delete_products,
            Capability::ViewFacilities => self.can_view_facilities,
            Capability::ImportData => self.can_import_data,
            Capability::ExportData => self.can_export_data,
            Capability::ViewAnalytics => self.can_view_analytics,
            Capability::ManageUsers => self.can_manage_users,
            Capability::ManageSystem => self.can_manage_system,
            Capability::ManageRoles => self.can_manage_roles,
            Capability::ApproveAssociations => self.can_approve_associations,
            Capability::ViewAuditLogs => self.can_view_audit_logs,
        }
    }

    pub fn granted(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(|cap| self.allows(*cap))
    }
}

pub fn base_permissions(role: Role) -> PermissionSet {
    let viewer = PermissionSet::viewer();
    match role {
        Role::National => PermissionSet::all(),
        Role::Regional => PermissionSet {
            can_manage_system: false,
            ..PermissionSet::all()
        },
        Role::Zonal => PermissionSet {
            can_create_products: true,
            can_edit_products: true,
            can_import_data: true,
            can_export_data: true,
            can_view_analytics: true,
            can_manage_users: true,
            can_manage_roles: true,
            can_approve_associations: true,
            can_view_audit_logs: true,
            ..viewer
        },
        Role::FacilityManager => PermissionSet {
            can_create_products: true,
            can_edit_products: true,
            can_import_data: true,
            can_export_data: true,
            can_view_analytics: true,
            can_manage_users: true,
            can_manage_roles: true,
            ..viewer
        },
        Role::ProgramManager => PermissionSet {
            can_export_data: true,
            can_view_analytics: true,
            can_approve_associations: true,
            ..viewer
        },
        Role::Finance => PermissionSet {
            can_export_data: true,
            can_view_analytics: true,
            ..viewer
        },
        Role::Procurement => PermissionSet {
            can_create_products: true,
            can_edit_products: true,
            can_import_data: true,
            can_view_analytics: true,
            ..viewer
        },
        Role::Qa => PermissionSet {
            can_edit_products: true,
            can_view_analytics: true,
            can_view_audit_logs: true,
            ..viewer
        },
        Role::FacilityOfficer => PermissionSet {
            can_create_products: true,
            can_edit_products: true,
            ..viewer
        },
        Role::DataAnalyst => PermissionSet {
            can_export_data: true,
            can_view_analytics: true,
            ..viewer
        },
        Role::Viewer => viewer,
    }
}

/// Catalog lookup for an untrusted storage code.
pub fn base_permissions_for_code(code: &str) -> PermissionSet {
    base_permissions(Role::from_external(code))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancedPermissions {
    #[serde(flatten)]
    pub base: PermissionSet,
    pub has_admin_access: bool,
    pub has_regional_access: bool,
    pub has_national_access: bool,
    pub can_create_facilities: bool,
    pub can_manage_facility_staff: bool,
    pub can_export_sensitive_data: bool,
    pub can_approve_procurement: bool,
}

// Thresholds are product decisions pending owner confirmation; see DESIGN.md.
pub fn enhance(base: &PermissionSet, role: Role) -> EnhancedPermissions {
    EnhancedPermissions {
        base: *base,
        has_admin_access: has_higher_or_equal_rank(role, Role::Zonal),
        has_regional_access: has_higher_or_equal_rank(role, Role::Regional),
        has_national_access: has_higher_or_equal_rank(role, Role::National),
        can_create_facilities: matches!(role, Role::National | Role::Regional | Role::Zonal),
        can_manage_facility_staff: has_higher_or_equal_rank(role, Role::FacilityManager),
        can_export_sensitive_data: base.can_export_data
            && has_higher_or_equal_rank(role, Role::Finance),
        can_approve_procurement: has_higher_or_equal_rank(role, Role::Procurement),
    }
}

pub fn permissions_for(role: Role) -> EnhancedPermissions {
    enhance(&base_permissions(role), role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewer_set_is_view_only() {
        let viewer = base_permissions(Role::Viewer);
        let granted: Vec<Capability> = viewer.granted().collect();
        assert_eq!(
            granted,
            vec![Capability::ViewProducts, Capability::ViewFacilities]
        );
    }

    #[test]
    fn every_role_can_view() {
        for role in Role::ALL {
            let set = base_permissions(role);
            assert!(set.can_view_products, "{role}");
            assert!(set.can_view_facilities, "{role}");
        }
    }

    #[test]
    fn only_national_manages_system() {
        for role in Role::ALL {
            assert_eq!(
                base_permissions(role).can_manage_system,
                role == Role::National,
                "{role}"
            );
        }
    }

    #[test]
    fn unknown_codes_get_viewer_catalog() {
        assert_eq!(base_permissions_for_code("ROOT"), PermissionSet::viewer());
        assert_eq!(
            base_permissions_for_code("ZONAL_MANAGER"),
            base_permissions(Role::Zonal)
        );
    }

    #[test]
    fn admin_access_iff_zonal_or_above() {
        for role in Role::ALL {
            let enhanced = enhance(&base_permissions(role), role);
            let expected = matches!(role, Role::National | Role::Regional | Role::Zonal);
            assert_eq!(enhanced.has_admin_access, expected, "{role}");
        }
    }

    #[test]
    fn enhance_copies_base_unchanged() {
        let base = base_permissions(Role::Procurement);
        let snapshot = base;
        let enhanced = enhance(&base, Role::Procurement);
        assert_eq!(base, snapshot);
        assert_eq!(enhanced.base, base);
        assert!(enhanced.can_approve_procurement);
        assert!(!enhanced.can_export_sensitive_data);
    }

    #[test]
    fn sensitive_export_needs_finance_and_export() {
        assert!(permissions_for(Role::Finance).can_export_sensitive_data);
        assert!(
            permissions_for(Role::ProgramManager).can_export_sensitive_data
        );
        assert!(
            !permissions_for(Role::DataAnalyst).can_export_sensitive_data
        );
        assert!(!permissions_for(Role::Qa).can_export_sensitive_data);
    }

    #[test]
    fn capability_names_parse_with_or_without_prefix() {
        assert_eq!(
            "can_manage_roles".parse::<Capability>(),
            Ok(Capability::ManageRoles)
        );
        assert_eq!(
            "EXPORT_DATA".parse::<Capability>(),
            Ok(Capability::ExportData)
        );
        assert!("launch_rockets".parse::<Capability>().is_err());
    }

    #[test]
    fn allows_matches_fields() {
        let set = base_permissions(Role::Qa);
        assert!(set.allows(Capability::ViewAuditLogs));
        assert!(set.allows(Capability::EditProducts));
        assert!(!set.allows(Capability::DeleteProducts));
    }

    #[test]
    fn enhanced_serializes_flat() {
        let value = serde_json::to_value(permissions_for(Role::Viewer)).unwrap();
        assert_eq!(value["can_view_products"], true);
        assert_eq!(value["has_admin_access"], false);
        assert!(value.get("base").is_none());
    }
}
