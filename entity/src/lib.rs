pub mod conditional_permission;
pub mod facility;
pub mod permission_audit_log;
pub mod product;
pub mod role_audit_log;
pub mod user;
pub mod user_facility_role;
