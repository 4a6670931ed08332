use sea_orm_migration::prelude::*;

use super::{
  m20261001_000001_create_platforms::Platforms,
  m20261001_000002_create_users::Users, m20261001_000003_create_games::Games,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Sessions::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Sessions::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Sessions::UserId).string().not_null())
          .col(ColumnDef::new(Sessions::GameId).integer().not_null())
          .col(ColumnDef::new(Sessions::PlatformId).integer().not_null())
          .col(ColumnDef::new(Sessions::Seconds).big_integer().not_null())
          .col(ColumnDef::new(Sessions::Timestamp).date_time().not_null())
          .col(
            ColumnDef::new(Sessions::Emulated)
              .boolean()
              .not_null()
              .default(false),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_sessions_user")
              .from(Sessions::Table, Sessions::UserId)
              .to(Users::Table, Users::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_sessions_game")
              .from(Sessions::Table, Sessions::GameId)
              .to(Games::Table, Games::Id)
              .on_delete(ForeignKeyAction::Restrict),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_sessions_platform")
              .from(Sessions::Table, Sessions::PlatformId)
              .to(Platforms::Table, Platforms::Id)
              .on_delete(ForeignKeyAction::Restrict),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_sessions_key_timestamp")
          .table(Sessions::Table)
          .col(Sessions::UserId)
          .col(Sessions::GameId)
          .col(Sessions::PlatformId)
          .col(Sessions::Timestamp)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Sessions::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Sessions {
  Table,
  Id,
  UserId,
  GameId,
  PlatformId,
  Seconds,
  Timestamp,
  Emulated,
}
