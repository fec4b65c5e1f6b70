//! Dashboard reads and writes.
//!
//! Callers are expected to have checked the subject's capabilities; these
//! functions only validate input and scope facility listings.

use chrono::Utc;
use entity::{facility, permission_audit_log, product, role_audit_log, user, user_facility_role};
use platform_authz::rpc::FacilityRoleRecord;
use platform_authz::{Role, Subject, has_higher_or_equal_rank};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::procedures::facility_role_record;
use crate::{DbError, DbResult};

pub const MAX_PAGE_SIZE: u64 = 200;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub facility_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct NewFacility {
    pub code: String,
    pub name: String,
    pub region: String,
    pub zone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub unit_cost_cents: i64,
}

pub async fn find_user<C: ConnectionTrait>(db: &C, user_id: Uuid) -> DbResult<Option<user::Model>> {
    Ok(user::Entity::find_by_id(user_id).one(db).await?)
}

/// Authorization context for an active account. Unknown stored role codes
/// resolve to the viewer role.
pub async fn subject_for<C: ConnectionTrait>(db: &C, user_id: Uuid) -> DbResult<Option<Subject>> {
    let subject = find_user(db, user_id)
        .await?
        .filter(|account| account.is_active)
        .map(|account| Subject {
            user_id: account.id,
            role: Role::from_external(&account.role_code),
            home_facility: account.facility_id,
        });
    Ok(subject)
}

pub async fn create_user<C: ConnectionTrait>(db: &C, input: NewUser) -> DbResult<user::Model> {
    let email = normalize_email(&input.email)?;
    let display_name = required("display_name", &input.display_name, 128)?;
    let taken = user::Entity::find()
        .filter(user::Column::Email.eq(email.clone()))
        .one(db)
        .await?
        .is_some();
    if taken {
        return Err(DbError::validation("email already registered"));
    }
    let now: DateTimeWithTimeZone = Utc::now().into();
    let created = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        display_name: Set(display_name),
        role_code: Set(input.role.to_external().into()),
        facility_id: Set(input.facility_id),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;
    Ok(created)
}

/// Facilities visible to the subject: every facility for multi-facility
/// roles, otherwise only the home facility.
pub async fn list_facilities<C: ConnectionTrait>(
    db: &C,
    subject: &Subject,
) -> DbResult<Vec<facility::Model>> {
    let mut query = facility::Entity::find().order_by_asc(facility::Column::Code);
    if !has_higher_or_equal_rank(subject.role, Role::Zonal) {
        let Some(home) = subject.home_facility else {
            return Ok(Vec::new());
        };
        query = query.filter(facility::Column::Id.eq(home));
    }
    Ok(query.all(db).await?)
}

pub async fn create_facility<C: ConnectionTrait>(
    db: &C,
    input: NewFacility,
) -> DbResult<facility::Model> {
    let code = required("code", &input.code, 32)?.to_ascii_uppercase();
    let name = required("name", &input.name, 256)?;
    let region = required("region", &input.region, 128)?;
    let zone = optional(input.zone.as_deref(), 128)?;
    let taken = facility::Entity::find()
        .filter(facility::Column::Code.eq(code.clone()))
        .one(db)
        .await?
        .is_some();
    if taken {
        return Err(DbError::validation(format!("facility code {code} already exists")));
    }
    let created = facility::ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(code),
        name: Set(name),
        region: Set(region),
        zone: Set(zone),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await?;
    Ok(created)
}

pub async fn list_products<C: ConnectionTrait>(db: &C) -> DbResult<Vec<product::Model>> {
    Ok(product::Entity::find()
        .order_by_asc(product::Column::Name)
        .all(db)
        .await?)
}

pub async fn create_product<C: ConnectionTrait>(
    db: &C,
    input: NewProduct,
) -> DbResult<product::Model> {
    let sku = required("sku", &input.sku, 64)?.to_ascii_uppercase();
    let name = required("name", &input.name, 256)?;
    let category = optional(input.category.as_deref(), 128)?;
    if input.unit_cost_cents < 0 {
        return Err(DbError::validation("unit_cost_cents must not be negative"));
    }
    let taken = product::Entity::find()
        .filter(product::Column::Sku.eq(sku.clone()))
        .one(db)
        .await?
        .is_some();
    if taken {
        return Err(DbError::validation(format!("sku {sku} already exists")));
    }
    let now: DateTimeWithTimeZone = Utc::now().into();
    let created = product::ActiveModel {
        id: Set(Uuid::new_v4()),
        sku: Set(sku),
        name: Set(name),
        category: Set(category),
        unit_cost_cents: Set(input.unit_cost_cents),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;
    Ok(created)
}

pub async fn delete_product<C: ConnectionTrait>(db: &C, product_id: Uuid) -> DbResult<()> {
    let result = product::Entity::delete_by_id(product_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(DbError::NotFound("product"));
    }
    Ok(())
}

pub async fn list_facility_roles<C: ConnectionTrait>(
    db: &C,
    facility_id: Uuid,
    include_revoked: bool,
) -> DbResult<Vec<FacilityRoleRecord>> {
    let mut query = user_facility_role::Entity::find()
        .filter(user_facility_role::Column::FacilityId.eq(facility_id))
        .order_by_asc(user_facility_role::Column::GrantedAt);
    if !include_revoked {
        query = query.filter(user_facility_role::Column::IsActive.eq(true));
    }
    let rows = query.all(db).await?;
    Ok(rows.into_iter().map(facility_role_record).collect())
}

/// Most recent permission checks first, capped at [`MAX_PAGE_SIZE`].
pub async fn recent_permission_usage<C: ConnectionTrait>(
    db: &C,
    first: u64,
) -> DbResult<Vec<permission_audit_log::Model>> {
    Ok(permission_audit_log::Entity::find()
        .order_by_desc(permission_audit_log::Column::CreatedAt)
        .limit(first.clamp(1, MAX_PAGE_SIZE))
        .all(db)
        .await?)
}

pub async fn role_history<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
) -> DbResult<Vec<role_audit_log::Model>> {
    Ok(role_audit_log::Entity::find()
        .filter(role_audit_log::Column::UserId.eq(user_id))
        .order_by_asc(role_audit_log::Column::CreatedAt)
        .all(db)
        .await?)
}

fn normalize_email(raw: &str) -> DbResult<String> {
    let email = raw.trim().to_ascii_lowercase();
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && domain.contains('.') && email.len() <= 320 =>
        {
            Ok(email)
        }
        _ => Err(DbError::validation(format!("invalid email address {raw:?}"))),
    }
}

fn required(field: &str, raw: &str, max_len: usize) -> DbResult<String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(DbError::validation(format!("{field} must not be empty")));
    }
    if value.chars().count() > max_len {
        return Err(DbError::validation(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(value.to_string())
}

fn optional(raw: Option<&str>, max_len: usize) -> DbResult<Option<String>> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => required("value", value, max_len).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_normalized() {
        assert_eq!(
            normalize_email("  Ada@Example.ORG ").unwrap(),
            "ada@example.org"
        );
        assert!(normalize_email("not-an-email").is_err());
        assert!(normalize_email("@example.org").is_err());
    }

    #[test]
    fn blank_optionals_collapse_to_none() {
        assert_eq!(optional(Some("   "), 10).unwrap(), None);
        assert_eq!(optional(Some(" North "), 10).unwrap(), Some("North".into()));
        assert!(required("name", " ", 10).is_err());
        assert!(required("name", "abcdefghijk", 10).is_err());
    }
}
