use anyhow::Result;
use entity::{role_audit_log, user_facility_role};
use platform_authz::Role;
use platform_authz::rpc::FacilityRoleRequest;
use platform_db::procedures::{assign_facility_role, get_effective_role_for_facility};
use platform_db::seed::seed_demo;
use sea_orm::{ConnectionTrait, DatabaseBackend, EntityTrait, PaginatorTrait, Statement};
use suite_tests::PgTestContext;

const INSERT_UNKNOWN_ROLE: &str = "INSERT INTO users \
    (id, email, display_name, role_code, is_active, created_at, updated_at) \
    VALUES (gen_random_uuid(), 'root@pharmachain.test', 'Root', 'SUPERUSER', true, now(), now())";

#[tokio::test]
async fn concurrent_assignments_leave_one_grant() -> Result<()> {
    let Some(ctx) = PgTestContext::new().await? else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return Ok(());
    };
    let seeded = seed_demo(&ctx.db).await?;
    let request = FacilityRoleRequest {
        user_id: seeded.viewer_id,
        facility_id: seeded.district_clinic_id,
        role: Role::Qa,
    };

    let (first, second) = tokio::join!(
        assign_facility_role(&ctx.db, seeded.national_id, &request),
        assign_facility_role(&ctx.db, seeded.manager_id, &request),
    );
    // The loser may fail on the unique index; it must not create a second row.
    assert!(first.is_ok() || second.is_ok());

    let grants = user_facility_role::Entity::find().count(&ctx.db).await?;
    assert_eq!(grants, 1);
    let audits = role_audit_log::Entity::find().count(&ctx.db).await?;
    let successes = [first.is_ok(), second.is_ok()]
        .into_iter()
        .filter(|ok| *ok)
        .count() as u64;
    assert_eq!(audits, successes);

    let effective =
        get_effective_role_for_facility(&ctx.db, seeded.viewer_id, seeded.district_clinic_id)
            .await?;
    assert_eq!(effective, Some(Role::Qa));

    ctx.cleanup().await;
    Ok(())
}

#[tokio::test]
async fn unknown_role_codes_are_rejected_by_the_schema() -> Result<()> {
    let Some(ctx) = PgTestContext::new().await? else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return Ok(());
    };
    let statement = Statement::from_string(DatabaseBackend::Postgres, INSERT_UNKNOWN_ROLE);
    let inserted = ctx.db.execute(statement).await;
    assert!(inserted.is_err());

    ctx.cleanup().await;
    Ok(())
}
