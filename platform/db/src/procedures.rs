//! Server-side procedures behind the `/rpc/*` endpoints.
//!
//! These are the decisions the client-side checks only approximate: role
//! grants are authorized here against the grantor's effective role, and every
//! grant change writes its audit row in the same transaction.

use chrono::Utc;
use entity::role_audit_log::Action;
use entity::{
    conditional_permission, permission_audit_log, role_audit_log, user, user_facility_role,
};
use platform_authz::checks::can_assign_role;
use platform_authz::hierarchy::highest;
use platform_authz::rpc::{
    ConditionalPermissionRequest, FacilityRoleRecord, FacilityRoleRequest, PermissionUsage,
};
use platform_authz::{AuthzError, Conditions, Role, has_higher_or_equal_rank};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, Set, TransactionTrait,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{DbError, DbResult};

#[instrument(skip(db))]
pub async fn has_national_users<C: ConnectionTrait>(db: &C) -> DbResult<bool> {
    let count = user::Entity::find()
        .filter(user::Column::RoleCode.eq(Role::National.to_external().as_str()))
        .filter(user::Column::IsActive.eq(true))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// The role a user holds at one facility.
///
/// The highest active facility grant wins. Without one, the account's global
/// role applies when the facility is the user's home facility or the global
/// role oversees multiple facilities, unless a grant of that same role was
/// revoked at the facility. Inactive and unknown users hold nothing.
#[instrument(skip(db))]
pub async fn get_effective_role_for_facility<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    facility_id: Uuid,
) -> DbResult<Option<Role>> {
    let Some(account) = user::Entity::find_by_id(user_id).one(db).await? else {
        return Ok(None);
    };
    if !account.is_active {
        return Ok(None);
    }
    let grants = user_facility_role::Entity::find()
        .filter(user_facility_role::Column::UserId.eq(user_id))
        .filter(user_facility_role::Column::FacilityId.eq(facility_id))
        .all(db)
        .await?;
    let active = grants
        .iter()
        .filter(|grant| grant.is_active)
        .map(|grant| Role::from_external(&grant.role_code));
    if let Some(role) = highest(active) {
        return Ok(Some(role));
    }
    let global = Role::from_external(&account.role_code);
    // A revoked grant of the global role withdraws that role here as well.
    let withdrawn = grants
        .iter()
        .any(|grant| !grant.is_active && Role::from_external(&grant.role_code) == global);
    let in_reach =
        account.facility_id == Some(facility_id) || has_higher_or_equal_rank(global, Role::Zonal);
    if in_reach && !withdrawn {
        Ok(Some(global))
    } else {
        Ok(None)
    }
}

/// True when any live conditional grant for the permission holds in the
/// supplied context. Grants whose stored conditions fail to parse are skipped.
#[instrument(
    skip(db, request),
    fields(
        user_id = %request.user_id,
        facility_id = %request.facility_id,
        permission = %request.permission_name,
    )
)]
pub async fn check_conditional_permissions<C: ConnectionTrait>(
    db: &C,
    request: &ConditionalPermissionRequest,
) -> DbResult<bool> {
    let permission = request.permission_name.trim();
    if permission.is_empty() {
        return Err(DbError::validation("permission_name must not be empty"));
    }
    let active_user = user::Entity::find_by_id(request.user_id)
        .one(db)
        .await?
        .is_some_and(|account| account.is_active);
    if !active_user {
        return Ok(false);
    }
    let now: DateTimeWithTimeZone = Utc::now().into();
    let grants = conditional_permission::Entity::find()
        .filter(conditional_permission::Column::UserId.eq(request.user_id))
        .filter(conditional_permission::Column::FacilityId.eq(request.facility_id))
        .filter(conditional_permission::Column::PermissionName.eq(permission))
        .filter(conditional_permission::Column::IsActive.eq(true))
        .all(db)
        .await?;
    for grant in grants {
        if grant.expires_at.is_some_and(|expires_at| expires_at <= now) {
            continue;
        }
        let conditions: Conditions = match serde_json::from_value(grant.conditions.clone()) {
            Ok(conditions) => conditions,
            Err(err) => {
                warn!(
                    grant_id = %grant.id,
                    error = %err,
                    "skipping conditional grant with malformed conditions"
                );
                continue;
            }
        };
        if conditions.evaluate(&request.context) {
            return Ok(true);
        }
    }
    Ok(false)
}

#[instrument(
    skip(db, usage),
    fields(
        user_id = %usage.user_id,
        permission = %usage.permission_name,
        granted = usage.granted,
    )
)]
pub async fn log_permission_usage<C: ConnectionTrait>(
    db: &C,
    usage: &PermissionUsage,
) -> DbResult<()> {
    let permission_name = usage.permission_name.trim();
    let resource_type = usage.resource_type.trim();
    if permission_name.is_empty() || resource_type.is_empty() {
        return Err(DbError::validation("permission_name and resource_type must not be empty"));
    }
    permission_audit_log::Entity::insert(permission_audit_log::ActiveModel {
        id: Set(usage.id.unwrap_or_else(Uuid::new_v4)),
        user_id: Set(usage.user_id),
        permission_name: Set(permission_name.to_string()),
        resource_type: Set(resource_type.to_string()),
        resource_id: Set(usage.resource_id.clone()),
        facility_id: Set(usage.facility_id),
        granted: Set(usage.granted),
        method: Set(usage.method.as_str().to_string()),
        created_at: Set(Utc::now().into()),
    })
    .on_conflict(
        OnConflict::column(permission_audit_log::Column::Id)
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(db)
    .await?;
    Ok(())
}

/// Grants `request.role` at the facility, reactivating a revoked grant
/// instead of inserting a duplicate.
#[instrument(
    skip(db, request),
    fields(
        grantor_id = %grantor_id,
        user_id = %request.user_id,
        facility_id = %request.facility_id,
        role = %request.role,
    )
)]
pub async fn assign_facility_role(
    db: &DatabaseConnection,
    grantor_id: Uuid,
    request: &FacilityRoleRequest,
) -> DbResult<FacilityRoleRecord> {
    let txn = db.begin().await?;
    let grantor_role = authorize_grantor(&txn, grantor_id, request).await?;
    ensure_target_exists(&txn, request).await?;

    let now: DateTimeWithTimeZone = Utc::now().into();
    let (grant, action) = match find_grant(&txn, request).await? {
        Some(existing) => {
            let mut active: user_facility_role::ActiveModel = existing.into();
            active.is_active = Set(true);
            active.granted_by = Set(Some(grantor_id));
            active.granted_at = Set(now);
            active.revoked_at = Set(None);
            active.revoked_by = Set(None);
            (active.update(&txn).await?, Action::Regrant)
        }
        None => {
            let grant = user_facility_role::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(request.user_id),
                facility_id: Set(request.facility_id),
                role_code: Set(request.role.to_external().into()),
                granted_by: Set(Some(grantor_id)),
                is_active: Set(true),
                granted_at: Set(now),
                revoked_at: Set(None),
                revoked_by: Set(None),
            }
            .insert(&txn)
            .await?;
            (grant, Action::Grant)
        }
    };
    record_role_change(&txn, grantor_id, &grant, action, now).await?;
    txn.commit().await?;

    info!(grantor_role = %grantor_role, action = ?action, "facility role granted");
    Ok(facility_role_record(grant))
}

/// Soft-revokes an active grant. The row stays for the audit trail.
#[instrument(
    skip(db, request),
    fields(
        grantor_id = %grantor_id,
        user_id = %request.user_id,
        facility_id = %request.facility_id,
        role = %request.role,
    )
)]
pub async fn revoke_facility_role(
    db: &DatabaseConnection,
    grantor_id: Uuid,
    request: &FacilityRoleRequest,
) -> DbResult<FacilityRoleRecord> {
    let txn = db.begin().await?;
    let grantor_role = authorize_grantor(&txn, grantor_id, request).await?;
    let existing = find_grant(&txn, request)
        .await?
        .filter(|grant| grant.is_active)
        .ok_or(DbError::NotFound("active facility role"))?;

    let now: DateTimeWithTimeZone = Utc::now().into();
    let mut active: user_facility_role::ActiveModel = existing.into();
    active.is_active = Set(false);
    active.revoked_at = Set(Some(now));
    active.revoked_by = Set(Some(grantor_id));
    let grant = active.update(&txn).await?;
    record_role_change(&txn, grantor_id, &grant, Action::Revoke, now).await?;
    txn.commit().await?;

    info!(grantor_role = %grantor_role, "facility role revoked");
    Ok(facility_role_record(grant))
}

pub fn facility_role_record(model: user_facility_role::Model) -> FacilityRoleRecord {
    FacilityRoleRecord {
        id: model.id,
        user_id: model.user_id,
        facility_id: model.facility_id,
        role: Role::from_external(&model.role_code),
        granted_by: model.granted_by,
        is_active: model.is_active,
        granted_at: model.granted_at.with_timezone(&Utc),
        revoked_at: model.revoked_at.map(|at| at.with_timezone(&Utc)),
    }
}

async fn authorize_grantor<C: ConnectionTrait>(
    db: &C,
    grantor_id: Uuid,
    request: &FacilityRoleRequest,
) -> DbResult<Role> {
    let Some(grantor_role) =
        get_effective_role_for_facility(db, grantor_id, request.facility_id).await?
    else {
        return Err(DbError::forbidden("grantor holds no role at this facility"));
    };
    if !can_assign_role(grantor_role, request.role) {
        let denied = AuthzError::AssignmentDenied {
            assigner: grantor_role,
            target: request.role,
        };
        warn!(%denied, "role assignment rejected");
        return Err(DbError::forbidden(denied.to_string()));
    }
    Ok(grantor_role)
}

async fn ensure_target_exists<C: ConnectionTrait>(
    db: &C,
    request: &FacilityRoleRequest,
) -> DbResult<()> {
    user::Entity::find_by_id(request.user_id)
        .one(db)
        .await?
        .ok_or(DbError::NotFound("user"))?;
    entity::facility::Entity::find_by_id(request.facility_id)
        .one(db)
        .await?
        .ok_or(DbError::NotFound("facility"))?;
    Ok(())
}

async fn find_grant<C: ConnectionTrait>(
    db: &C,
    request: &FacilityRoleRequest,
) -> DbResult<Option<user_facility_role::Model>> {
    Ok(user_facility_role::Entity::find()
        .filter(user_facility_role::Column::UserId.eq(request.user_id))
        .filter(user_facility_role::Column::FacilityId.eq(request.facility_id))
        .filter(user_facility_role::Column::RoleCode.eq(request.role.to_external().as_str()))
        .one(db)
        .await?)
}

async fn record_role_change<C: ConnectionTrait>(
    db: &C,
    actor_id: Uuid,
    grant: &user_facility_role::Model,
    action: Action,
    at: DateTimeWithTimeZone,
) -> DbResult<()> {
    role_audit_log::Entity::insert(role_audit_log::ActiveModel {
        id: Set(Uuid::new_v4()),
        actor_id: Set(actor_id),
        user_id: Set(grant.user_id),
        facility_id: Set(grant.facility_id),
        role_code: Set(grant.role_code.clone()),
        action: Set(action),
        created_at: Set(at),
    })
    .exec_without_returning(db)
    .await?;
    Ok(())
}
