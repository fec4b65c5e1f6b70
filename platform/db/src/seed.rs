use chrono::Utc;
use entity::conditional_permission;
use platform_authz::Role;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set, TransactionTrait};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::directory::{
    NewFacility, NewProduct, NewUser, create_facility, create_product, create_user,
};
use crate::procedures::has_national_users;
use crate::{DbError, DbResult};

#[derive(Debug, Clone, Copy)]
pub struct SeededDirectory {
    pub national_id: Uuid,
    pub regional_id: Uuid,
    pub manager_id: Uuid,
    pub officer_id: Uuid,
    pub viewer_id: Uuid,
    pub central_store_id: Uuid,
    pub district_clinic_id: Uuid,
}

/// Loads a small demo directory: two facilities, one account per tier and a
/// business-hours conditional export grant for the facility officer.
pub async fn seed_demo(db: &DatabaseConnection) -> DbResult<SeededDirectory> {
    if has_national_users(db).await? {
        return Err(DbError::validation("store already has a national administrator"));
    }
    let txn = db.begin().await?;

    let central_store = create_facility(
        &txn,
        NewFacility {
            code: "CMS-001".into(),
            name: "Central Medical Stores".into(),
            region: "Central".into(),
            zone: None,
        },
    )
    .await?;
    let district_clinic = create_facility(
        &txn,
        NewFacility {
            code: "DHC-014".into(),
            name: "District Health Clinic 14".into(),
            region: "Central".into(),
            zone: Some("North".into()),
        },
    )
    .await?;

    let account = |local: &str, name: &str, role: Role, facility_id: Option<Uuid>| NewUser {
        email: format!("{local}@pharmachain.test"),
        display_name: name.into(),
        role,
        facility_id,
    };
    let clinic = Some(district_clinic.id);
    let store = Some(central_store.id);
    let national = account("national", "Nia National", Role::National, None);
    let national = create_user(&txn, national).await?;
    let regional = account("regional", "Reza Regional", Role::Regional, None);
    let regional = create_user(&txn, regional).await?;
    let manager = account("manager", "Mara Manager", Role::FacilityManager, clinic);
    let manager = create_user(&txn, manager).await?;
    let officer = account("officer", "Otto Officer", Role::FacilityOfficer, clinic);
    let officer = create_user(&txn, officer).await?;
    let viewer = account("viewer", "Vera Viewer", Role::Viewer, store);
    let viewer = create_user(&txn, viewer).await?;

    for (sku, name, category, cents) in [
        ("AMX-500", "Amoxicillin 500mg capsules", "Antibiotics", 1250),
        ("ORS-20", "Oral rehydration salts 20.5g", "Rehydration", 180),
        ("ART-LUM", "Artemether/Lumefantrine", "Antimalarials", 2875),
    ] {
        create_product(
            &txn,
            NewProduct {
                sku: sku.into(),
                name: name.into(),
                category: Some(category.into()),
                unit_cost_cents: cents,
            },
        )
        .await?;
    }

    conditional_permission::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(officer.id),
        facility_id: Set(district_clinic.id),
        permission_name: Set("export_data".into()),
        conditions: Set(json!({
            "time_window": {"start": "08:00", "end": "17:00"},
            "days": ["mon", "tue", "wed", "thu", "fri"]
        })),
        is_active: Set(true),
        expires_at: Set(None),
        granted_by: Set(Some(national.id)),
        created_at: Set(Utc::now().into()),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(national = %national.email, "seeded demo directory");
    Ok(SeededDirectory {
        national_id: national.id,
        regional_id: regional.id,
        manager_id: manager.id,
        officer_id: officer.id,
        viewer_id: viewer.id,
        central_store_id: central_store.id,
        district_clinic_id: district_clinic.id,
    })
}
