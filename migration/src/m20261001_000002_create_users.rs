use sea_orm_migration::prelude::*;

use super::m20261001_000001_create_platforms::Platforms;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Users::Table)
          .if_not_exists()
          .col(ColumnDef::new(Users::Id).string().not_null().primary_key())
          .col(ColumnDef::new(Users::Name).string().not_null())
          .col(ColumnDef::new(Users::DefaultPlatformId).integer().not_null())
          .col(
            ColumnDef::new(Users::PcPlatform)
              .string()
              .not_null()
              .default("win"),
          )
          .col(
            ColumnDef::new(Users::CommandsBlocked)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(ColumnDef::new(Users::CreatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_users_default_platform")
              .from(Users::Table, Users::DefaultPlatformId)
              .to(Platforms::Table, Platforms::Id)
              .on_delete(ForeignKeyAction::Restrict),
          )
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Users::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Users {
  Table,
  Id,
  Name,
  DefaultPlatformId,
  PcPlatform,
  CommandsBlocked,
  CreatedAt,
}
