use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "role_audit_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub actor_id: Uuid,
    #[sea_orm(indexed)]
    pub user_id: Uuid,
    pub facility_id: Uuid,
    pub role_code: String,
    pub action: Action,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
pub enum Action {
    #[sea_orm(string_value = "GRANT")]
    Grant,
    #[sea_orm(string_value = "REGRANT")]
    Regrant,
    #[sea_orm(string_value = "REVOKE")]
    Revoke,
}

impl ActiveModelBehavior for ActiveModel {}
