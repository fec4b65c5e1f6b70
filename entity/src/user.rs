use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    pub display_name: String,
    /// Storage role code; untrusted, map through `Role::from_external`.
    pub role_code: String,
    #[sea_orm(indexed)]
    pub facility_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::facility::Entity",
        from = "Column::FacilityId",
        to = "super::facility::Column::Id",
        on_delete = "SetNull"
    )]
    Facility,
    #[sea_orm(has_many = "super::user_facility_role::Entity")]
    FacilityRole,
}

impl Related<super::facility::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Facility.def()
    }
}

impl Related<super::user_facility_role::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FacilityRole.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
