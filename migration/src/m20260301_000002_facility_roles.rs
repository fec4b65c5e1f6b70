use sea_orm_migration::prelude::*;

use crate::role_code_check;

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Facilities {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum UserFacilityRoles {
    Table,
    Id,
    UserId,
    FacilityId,
    RoleCode,
    GrantedBy,
    IsActive,
    GrantedAt,
    RevokedAt,
    RevokedBy,
}

#[derive(DeriveIden)]
enum ConditionalPermissions {
    Table,
    Id,
    UserId,
    FacilityId,
    PermissionName,
    Conditions,
    IsActive,
    ExpiresAt,
    GrantedBy,
    CreatedAt,
}

#[derive(DeriveIden)]
enum PermissionAuditLog {
    Table,
    Id,
    UserId,
    PermissionName,
    ResourceType,
    ResourceId,
    FacilityId,
    Granted,
    Method,
    CreatedAt,
}

#[derive(DeriveIden)]
enum RoleAuditLog {
    Table,
    Id,
    ActorId,
    UserId,
    FacilityId,
    RoleCode,
    Action,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserFacilityRoles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserFacilityRoles::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserFacilityRoles::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(UserFacilityRoles::FacilityId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserFacilityRoles::RoleCode)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(UserFacilityRoles::GrantedBy).uuid())
                    .col(
                        ColumnDef::new(UserFacilityRoles::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(UserFacilityRoles::GrantedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UserFacilityRoles::RevokedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(UserFacilityRoles::RevokedBy).uuid())
                    .check(role_code_check("role_code"))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_facility_roles_user")
                            .from(UserFacilityRoles::Table, UserFacilityRoles::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_facility_roles_facility")
                            .from(UserFacilityRoles::Table, UserFacilityRoles::FacilityId)
                            .to(Facilities::Table, Facilities::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_user_facility_roles_grant")
                    .table(UserFacilityRoles::Table)
                    .col(UserFacilityRoles::UserId)
                    .col(UserFacilityRoles::FacilityId)
                    .col(UserFacilityRoles::RoleCode)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ConditionalPermissions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ConditionalPermissions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ConditionalPermissions::UserId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConditionalPermissions::FacilityId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConditionalPermissions::PermissionName)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConditionalPermissions::Conditions)
                            .json()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConditionalPermissions::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(ConditionalPermissions::ExpiresAt)
                            .timestamp_with_time_zone(),
                    )
                    .col(ColumnDef::new(ConditionalPermissions::GrantedBy).uuid())
                    .col(
                        ColumnDef::new(ConditionalPermissions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_conditional_permissions_user")
                            .from(
                                ConditionalPermissions::Table,
                                ConditionalPermissions::UserId,
                            )
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_conditional_permissions_facility")
                            .from(
                                ConditionalPermissions::Table,
                                ConditionalPermissions::FacilityId,
                            )
                            .to(Facilities::Table, Facilities::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_conditional_permissions_lookup")
                    .table(ConditionalPermissions::Table)
                    .col(ConditionalPermissions::UserId)
                    .col(ConditionalPermissions::FacilityId)
                    .col(ConditionalPermissions::PermissionName)
                    .to_owned(),
            )
            .await?;

        // Audit tables carry no foreign keys so entries survive user deletion.
        manager
            .create_table(
                Table::create()
                    .table(PermissionAuditLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PermissionAuditLog::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PermissionAuditLog::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(PermissionAuditLog::PermissionName)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PermissionAuditLog::ResourceType)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(PermissionAuditLog::ResourceId).string_len(128))
                    .col(ColumnDef::new(PermissionAuditLog::FacilityId).uuid())
                    .col(
                        ColumnDef::new(PermissionAuditLog::Granted)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PermissionAuditLog::Method)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PermissionAuditLog::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_permission_audit_log_user")
                    .table(PermissionAuditLog::Table)
                    .col(PermissionAuditLog::UserId)
                    .col(PermissionAuditLog::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RoleAuditLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RoleAuditLog::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RoleAuditLog::ActorId).uuid().not_null())
                    .col(ColumnDef::new(RoleAuditLog::UserId).uuid().not_null())
                    .col(ColumnDef::new(RoleAuditLog::FacilityId).uuid().not_null())
                    .col(
                        ColumnDef::new(RoleAuditLog::RoleCode)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RoleAuditLog::Action)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RoleAuditLog::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .check(Expr::cust("(action IN ('GRANT','REGRANT','REVOKE'))"))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_role_audit_log_user")
                    .table(RoleAuditLog::Table)
                    .col(RoleAuditLog::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RoleAuditLog::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PermissionAuditLog::Table).to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(ConditionalPermissions::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(UserFacilityRoles::Table).to_owned())
            .await?;
        Ok(())
    }
}
