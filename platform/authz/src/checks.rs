//! Advisory predicates for presentation gating.
//!
//! These decide what to render. Every mutating call is checked again by the
//! store, so a `true` here is never sufficient on its own.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Role;
use crate::hierarchy;
use crate::permissions::{Capability, base_permissions, enhance};

/// The caller whose access is being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub user_id: Uuid,
    pub role: Role,
    pub home_facility: Option<Uuid>,
}

impl Subject {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self {
            user_id,
            role,
            home_facility: None,
        }
    }

    pub fn at_facility(mut self, facility_id: Uuid) -> Self {
        self.home_facility = Some(facility_id);
        self
    }
}

pub use crate::hierarchy::{has_higher_or_equal_rank, outranks};

pub fn can_perform(role: Role, capability: Capability) -> bool {
    base_permissions(role).allows(capability)
}

/// National administrators may assign any role, including their own; every
/// other role manager may only assign roles strictly below itself.
pub fn can_assign_role(assigner: Role, target: Role) -> bool {
    if !base_permissions(assigner).can_manage_roles {
        return false;
    }
    assigner == Role::National || outranks(assigner, target)
}

pub fn assignable_roles(assigner: Role) -> Vec<Role> {
    hierarchy::ROLE_HIERARCHY
        .into_iter()
        .filter(|target| can_assign_role(assigner, *target))
        .collect()
}

pub fn can_manage_user(actor: Role, target: Role) -> bool {
    base_permissions(actor).can_manage_users && outranks(actor, target)
}

pub fn can_create_facilities(role: Role) -> bool {
    enhance(&base_permissions(role), role).can_create_facilities
}

/// Roles at zonal level or above oversee every facility in scope; everyone
/// else is limited to the facility they are attached to.
pub fn can_access_facility(subject: &Subject, facility_id: Uuid) -> bool {
    if has_higher_or_equal_rank(subject.role, Role::Zonal) {
        return true;
    }
    subject.home_facility == Some(facility_id)
}

pub fn can_view_audit_trail(subject: &Subject) -> bool {
    base_permissions(subject.role).can_view_audit_logs
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Dashboard,
    Products,
    Facilities,
    Analytics,
    ImportExport,
    Users,
    Roles,
    AuditLogs,
    Settings,
}

impl Route {
    pub const ALL: [Route; 9] = [
        Route::Dashboard,
        Route::Products,
        Route::Facilities,
        Route::Analytics,
        Route::ImportExport,
        Route::Users,
        Route::Roles,
        Route::AuditLogs,
        Route::Settings,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Route::Dashboard => "/",
            Route::Products => "/products",
            Route::Facilities => "/facilities",
            Route::Analytics => "/analytics",
            Route::ImportExport => "/import-export",
            Route::Users => "/users",
            Route::Roles => "/roles",
            Route::AuditLogs => "/audit-logs",
            Route::Settings => "/settings",
        }
    }
}

pub fn can_access_route(role: Role, route: Route) -> bool {
    let perms = base_permissions(role);
    match route {
        Route::Dashboard => true,
        Route::Products => perms.can_view_products,
        Route::Facilities => perms.can_view_facilities,
        Route::Analytics => perms.can_view_analytics,
        Route::ImportExport => perms.can_import_data || perms.can_export_data,
        Route::Users => perms.can_manage_users,
        Route::Roles => perms.can_manage_roles,
        Route::AuditLogs => perms.can_view_audit_logs,
        Route::Settings => perms.can_manage_system,
    }
}

pub fn navigation(role: Role) -> Vec<Route> {
    Route::ALL
        .into_iter()
        .filter(|route| can_access_route(role, *route))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facility_creation_is_limited_to_area_managers() {
        assert!(can_create_facilities(Role::National));
        assert!(can_create_facilities(Role::Zonal));
        assert!(!can_create_facilities(Role::FacilityOfficer));
        assert!(!can_create_facilities(Role::FacilityManager));
    }

    #[test]
    fn national_assigns_everything() {
        assert_eq!(assignable_roles(Role::National).len(), Role::ALL.len());
        assert!(can_assign_role(Role::National, Role::National));
    }

    #[test]
    fn managers_assign_only_below_themselves() {
        assert!(can_assign_role(Role::FacilityManager, Role::FacilityOfficer));
        assert!(!can_assign_role(Role::FacilityManager, Role::FacilityManager));
        assert!(!can_assign_role(Role::FacilityManager, Role::Zonal));
        assert!(can_assign_role(Role::Regional, Role::Zonal));
        assert!(!can_assign_role(Role::Regional, Role::National));
    }

    #[test]
    fn roles_without_manage_roles_assign_nothing() {
        for role in [Role::ProgramManager, Role::Finance, Role::Qa, Role::Viewer] {
            assert!(assignable_roles(role).is_empty(), "{role}");
        }
    }

    #[test]
    fn user_management_needs_strict_seniority() {
        assert!(can_manage_user(Role::Zonal, Role::FacilityManager));
        assert!(!can_manage_user(Role::Zonal, Role::Zonal));
        assert!(!can_manage_user(Role::DataAnalyst, Role::Viewer));
    }

    #[test]
    fn facility_scope_follows_home_facility() {
        let home = Uuid::new_v4();
        let other = Uuid::new_v4();
        let officer = Subject::new(Uuid::new_v4(), Role::FacilityOfficer).at_facility(home);
        assert!(can_access_facility(&officer, home));
        assert!(!can_access_facility(&officer, other));

        let unattached = Subject::new(Uuid::new_v4(), Role::FacilityManager);
        assert!(!can_access_facility(&unattached, home));

        let zonal = Subject::new(Uuid::new_v4(), Role::Zonal);
        assert!(can_access_facility(&zonal, other));
    }

    #[test]
    fn viewer_navigation_is_minimal() {
        assert_eq!(
            navigation(Role::Viewer),
            vec![Route::Dashboard, Route::Products, Route::Facilities]
        );
        assert_eq!(navigation(Role::National), Route::ALL.to_vec());
        assert!(!can_access_route(Role::Regional, Route::Settings));
    }

    #[test]
    fn capability_lookup_matches_catalog() {
        assert!(can_perform(Role::Procurement, Capability::ImportData));
        assert!(!can_perform(Role::Procurement, Capability::ExportData));
    }
}
