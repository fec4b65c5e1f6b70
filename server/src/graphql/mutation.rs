use async_graphql::{Context, ID, InputObject, Object};
use platform_authz::Capability;
use platform_authz::checks::{can_create_facilities, can_perform};
use platform_authz::rpc::{CheckMethod, FacilityRoleRequest};
use platform_db::directory::{self, NewFacility, NewProduct};
use platform_db::procedures;
use tracing::instrument;

use super::types::{FacilityNode, FacilityRoleNode, ProductNode, RoleName};
use super::{api_error, authorize_mutation, current_subject, database, parse_uuid, record_usage};

#[derive(Default)]
pub struct MutationRoot;

#[derive(InputObject)]
pub struct CreateFacilityInput {
    pub code: String,
    pub name: String,
    pub region: String,
    pub zone: Option<String>,
}

#[derive(InputObject)]
pub struct CreateProductInput {
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    #[graphql(default)]
    pub unit_cost_cents: i64,
}

#[derive(InputObject)]
pub struct FacilityRoleInput {
    pub user_id: ID,
    pub facility_id: ID,
    pub role: RoleName,
}

impl FacilityRoleInput {
    fn to_request(&self) -> async_graphql::Result<FacilityRoleRequest> {
        Ok(FacilityRoleRequest {
            user_id: parse_uuid(&self.user_id)?,
            facility_id: parse_uuid(&self.facility_id)?,
            role: self.role.into(),
        })
    }
}

#[Object]
impl MutationRoot {
    #[graphql(name = "createFacility")]
    #[instrument(name = "graphql.create_facility", skip_all)]
    async fn create_facility(
        &self,
        ctx: &Context<'_>,
        input: CreateFacilityInput,
    ) -> async_graphql::Result<FacilityNode> {
        authorize_mutation(ctx, "create_facilities", "facility", can_create_facilities).await?;
        let db = database(ctx)?;
        let created = directory::create_facility(
            db.as_ref(),
            NewFacility {
                code: input.code,
                name: input.name,
                region: input.region,
                zone: input.zone,
            },
        )
        .await
        .map_err(api_error)?;
        Ok(created.into())
    }

    #[graphql(name = "createProduct")]
    #[instrument(name = "graphql.create_product", skip_all)]
    async fn create_product(
        &self,
        ctx: &Context<'_>,
        input: CreateProductInput,
    ) -> async_graphql::Result<ProductNode> {
        authorize_mutation(ctx, "create_products", "product", |role| {
            can_perform(role, Capability::CreateProducts)
        })
        .await?;
        let db = database(ctx)?;
        let created = directory::create_product(
            db.as_ref(),
            NewProduct {
                sku: input.sku,
                name: input.name,
                category: input.category,
                unit_cost_cents: input.unit_cost_cents,
            },
        )
        .await
        .map_err(api_error)?;
        Ok(created.into())
    }

    #[graphql(name = "deleteProduct")]
    #[instrument(name = "graphql.delete_product", skip_all)]
    async fn delete_product(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<bool> {
        authorize_mutation(ctx, "delete_products", "product", |role| {
            can_perform(role, Capability::DeleteProducts)
        })
        .await?;
        let db = database(ctx)?;
        directory::delete_product(db.as_ref(), parse_uuid(&id)?)
            .await
            .map_err(api_error)?;
        Ok(true)
    }

    /// The store checks the caller's role at the target facility.
    #[graphql(name = "assignFacilityRole")]
    #[instrument(name = "graphql.assign_facility_role", skip_all)]
    async fn assign_facility_role(
        &self,
        ctx: &Context<'_>,
        input: FacilityRoleInput,
    ) -> async_graphql::Result<FacilityRoleNode> {
        let subject = current_subject(ctx)?;
        let request = input.to_request()?;
        let db = database(ctx)?;
        let result = procedures::assign_facility_role(db.as_ref(), subject.user_id, &request).await;
        record_usage(
            ctx,
            &subject,
            "manage_roles",
            "facility_role",
            Some(request.facility_id),
            result.is_ok(),
            CheckMethod::FacilityRole,
        )
        .await;
        Ok(result.map_err(api_error)?.into())
    }

    #[graphql(name = "revokeFacilityRole")]
    #[instrument(name = "graphql.revoke_facility_role", skip_all)]
    async fn revoke_facility_role(
        &self,
        ctx: &Context<'_>,
        input: FacilityRoleInput,
    ) -> async_graphql::Result<FacilityRoleNode> {
        let subject = current_subject(ctx)?;
        let request = input.to_request()?;
        let db = database(ctx)?;
        let result = procedures::revoke_facility_role(db.as_ref(), subject.user_id, &request).await;
        record_usage(
            ctx,
            &subject,
            "manage_roles",
            "facility_role",
            Some(request.facility_id),
            result.is_ok(),
            CheckMethod::FacilityRole,
        )
        .await;
        Ok(result.map_err(api_error)?.into())
    }
}
