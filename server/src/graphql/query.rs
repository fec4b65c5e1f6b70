use async_graphql::{Context, ID, Object};
use platform_api::ApiError;
use platform_authz::checks::can_perform;
use platform_authz::{Capability, Role};
use platform_db::directory;
use tracing::instrument;

use super::types::{
    FacilityNode, FacilityRoleNode, MeNode, PermissionUsageNode, ProductNode, RoleChangeNode,
};
use super::{
    api_error, current_subject, database, parse_uuid, read_guard, subject_at_facility,
};

#[derive(Default)]
pub struct QueryRoot;

fn require_capability(
    ctx: &Context<'_>,
    capability: Capability,
) -> async_graphql::Result<platform_authz::Subject> {
    let subject = current_subject(ctx)?;
    if can_perform(subject.role, capability) {
        Ok(subject)
    } else {
        Err(api_error(ApiError::forbidden(format!(
            "missing permission {capability}"
        ))))
    }
}

#[Object]
impl QueryRoot {
    #[instrument(name = "graphql.me", skip_all)]
    async fn me(&self, ctx: &Context<'_>) -> async_graphql::Result<MeNode> {
        let subject = current_subject(ctx)?;
        let db = database(ctx)?;
        let account = directory::find_user(db.as_ref(), subject.user_id)
            .await
            .map_err(api_error)?
            .ok_or_else(|| api_error(ApiError::NotFound("user")))?;
        Ok(MeNode::from_model(account))
    }

    #[instrument(name = "graphql.facilities", skip_all)]
    async fn facilities(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<FacilityNode>> {
        let subject = require_capability(ctx, Capability::ViewFacilities)?;
        let db = database(ctx)?;
        let rows = directory::list_facilities(db.as_ref(), &subject)
            .await
            .map_err(api_error)?;
        Ok(rows.into_iter().map(FacilityNode::from).collect())
    }

    #[instrument(name = "graphql.products", skip_all)]
    async fn products(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<ProductNode>> {
        require_capability(ctx, Capability::ViewProducts)?;
        let db = database(ctx)?;
        let rows = directory::list_products(db.as_ref())
            .await
            .map_err(api_error)?;
        Ok(rows.into_iter().map(ProductNode::from).collect())
    }

    #[graphql(name = "facilityRoles")]
    #[instrument(name = "graphql.facility_roles", skip_all)]
    async fn facility_roles(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "facilityId")] facility_id: ID,
        #[graphql(name = "includeRevoked", default)] include_revoked: bool,
    ) -> async_graphql::Result<Vec<FacilityRoleNode>> {
        let subject = current_subject(ctx)?;
        let facility_id = parse_uuid(&facility_id)?;
        let Some(subject) = subject_at_facility(ctx, subject, facility_id).await? else {
            return Err(api_error(ApiError::forbidden("facility outside your scope")));
        };
        read_guard(
            ctx,
            &subject,
            Role::FacilityManager,
            "facility_roles",
            Some(facility_id),
        )
        .await?;
        let db = database(ctx)?;
        let rows = directory::list_facility_roles(db.as_ref(), facility_id, include_revoked)
            .await
            .map_err(api_error)?;
        Ok(rows.into_iter().map(FacilityRoleNode::from).collect())
    }

    #[graphql(name = "permissionAuditLog")]
    #[instrument(name = "graphql.permission_audit_log", skip_all)]
    async fn permission_audit_log(
        &self,
        ctx: &Context<'_>,
        #[graphql(default = 50)] first: i32,
    ) -> async_graphql::Result<Vec<PermissionUsageNode>> {
        require_capability(ctx, Capability::ViewAuditLogs)?;
        let db = database(ctx)?;
        let rows = directory::recent_permission_usage(db.as_ref(), first.max(1) as u64)
            .await
            .map_err(api_error)?;
        Ok(rows.into_iter().map(PermissionUsageNode::from).collect())
    }

    #[graphql(name = "roleAuditLog")]
    #[instrument(name = "graphql.role_audit_log", skip_all)]
    async fn role_audit_log(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "userId")] user_id: ID,
    ) -> async_graphql::Result<Vec<RoleChangeNode>> {
        require_capability(ctx, Capability::ViewAuditLogs)?;
        let db = database(ctx)?;
        let rows = directory::role_history(db.as_ref(), parse_uuid(&user_id)?)
            .await
            .map_err(api_error)?;
        Ok(rows.into_iter().map(RoleChangeNode::from).collect())
    }
}
