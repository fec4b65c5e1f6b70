pub use sea_orm_migration::prelude::*;

mod m20260301_000001_directory;
mod m20260301_000002_facility_roles;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_directory::Migration),
            Box::new(m20260301_000002_facility_roles::Migration),
        ]
    }
}

/// SQL `CHECK` clause restricting a column to the known storage role codes.
pub(crate) fn role_code_check(column: &str) -> SimpleExpr {
    let codes = platform_authz::RoleCode::all()
        .map(|code| format!("'{}'", code.as_str()))
        .collect::<Vec<_>>()
        .join(",");
    Expr::cust(format!("({column} IN ({codes}))"))
}
