//! Dashboard GraphQL API. Every resolver re-checks the caller's role; the
//! client-side gating is never trusted.

mod mutation;
mod query;
pub mod types;

use std::sync::Arc;

use async_graphql::{Context, EmptySubscription, ErrorExtensions, ID, Schema};
use platform_api::ApiError;
use platform_authz::rpc::{CheckMethod, PermissionUsage};
use platform_authz::{GuardMode, GuardVerdict, Role, RoleGuard, Subject};
use platform_db::procedures::{get_effective_role_for_facility, log_permission_usage};
use sea_orm::DatabaseConnection;
use tracing::warn;
use uuid::Uuid;

pub use mutation::MutationRoot;
pub use query::QueryRoot;

pub type SchemaType = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub fn build_schema(db: Arc<DatabaseConnection>, guard_mode: GuardMode) -> SchemaType {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(db)
        .data(guard_mode)
        .finish()
}

fn database(ctx: &Context<'_>) -> async_graphql::Result<Arc<DatabaseConnection>> {
    ctx.data::<Arc<DatabaseConnection>>()
        .cloned()
        .map_err(|_| ApiError::internal(anyhow::anyhow!("missing database connection")).extend())
}

fn current_subject(ctx: &Context<'_>) -> async_graphql::Result<Subject> {
    ctx.data::<Subject>()
        .copied()
        .map_err(|_| ApiError::Unauthenticated.extend())
}

/// The caller as they stand at one facility: their effective role there,
/// scoped to that facility. `None` when they hold no role at it.
async fn subject_at_facility(
    ctx: &Context<'_>,
    subject: Subject,
    facility_id: Uuid,
) -> async_graphql::Result<Option<Subject>> {
    let db = database(ctx)?;
    let role = get_effective_role_for_facility(db.as_ref(), subject.user_id, facility_id)
        .await
        .map_err(api_error)?;
    Ok(role.map(|role| Subject {
        role,
        home_facility: Some(facility_id),
        ..subject
    }))
}

/// Gate for read-only queries; honours the configured guard mode.
async fn read_guard(
    ctx: &Context<'_>,
    subject: &Subject,
    minimum: Role,
    resource_type: &str,
    facility_id: Option<Uuid>,
) -> async_graphql::Result<()> {
    let mode = ctx.data::<GuardMode>().copied().unwrap_or_default();
    match RoleGuard::with_mode(minimum, mode).check(subject) {
        GuardVerdict::Granted => Ok(()),
        GuardVerdict::PassedThrough => {
            let permission = format!("minimum_role:{minimum}");
            record_usage(
                ctx,
                subject,
                &permission,
                resource_type,
                facility_id,
                false,
                CheckMethod::Guard,
            )
            .await;
            Ok(())
        }
        GuardVerdict::Denied => {
            Err(ApiError::forbidden(format!("requires {} or above", minimum.label())).extend())
        }
    }
}

/// Gate for mutations. Always enforcing; both outcomes are audited.
async fn authorize_mutation(
    ctx: &Context<'_>,
    permission: &str,
    resource_type: &str,
    allowed: fn(Role) -> bool,
) -> async_graphql::Result<Subject> {
    let subject = current_subject(ctx)?;
    let granted = allowed(subject.role);
    record_usage(
        ctx,
        &subject,
        permission,
        resource_type,
        None,
        granted,
        CheckMethod::RoleBased,
    )
    .await;
    if granted {
        Ok(subject)
    } else {
        Err(ApiError::forbidden(format!("missing permission {permission}")).extend())
    }
}

/// Best-effort audit write; a failure never changes the outcome.
async fn record_usage(
    ctx: &Context<'_>,
    subject: &Subject,
    permission: &str,
    resource_type: &str,
    facility_id: Option<Uuid>,
    granted: bool,
    method: CheckMethod,
) {
    let Ok(db) = database(ctx) else {
        return;
    };
    let usage = PermissionUsage {
        id: None,
        user_id: subject.user_id,
        permission_name: permission.to_string(),
        resource_type: resource_type.to_string(),
        resource_id: None,
        facility_id,
        granted,
        method,
    };
    if let Err(err) = log_permission_usage(db.as_ref(), &usage).await {
        warn!(
            user_id = %subject.user_id,
            permission,
            error = %err,
            "permission audit write failed"
        );
    }
}

fn parse_uuid(id: &ID) -> async_graphql::Result<Uuid> {
    Uuid::parse_str(id.as_str())
        .map_err(|_| ApiError::Validation(format!("invalid id {}", id.as_str())).extend())
}

fn api_error(err: impl Into<ApiError>) -> async_graphql::Error {
    err.into().extend()
}
