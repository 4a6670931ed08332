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
          .table(LiveSessions::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(LiveSessions::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(
            ColumnDef::new(LiveSessions::UserId)
              .string()
              .not_null()
              .unique_key(),
          )
          .col(ColumnDef::new(LiveSessions::GameId).integer().not_null())
          .col(ColumnDef::new(LiveSessions::PlatformId).integer().not_null())
          .col(ColumnDef::new(LiveSessions::Started).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_live_sessions_user")
              .from(LiveSessions::Table, LiveSessions::UserId)
              .to(Users::Table, Users::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_live_sessions_game")
              .from(LiveSessions::Table, LiveSessions::GameId)
              .to(Games::Table, Games::Id)
              .on_delete(ForeignKeyAction::Restrict),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_live_sessions_platform")
              .from(LiveSessions::Table, LiveSessions::PlatformId)
              .to(Platforms::Table, Platforms::Id)
              .on_delete(ForeignKeyAction::Restrict),
          )
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(LiveSessions::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum LiveSessions {
  Table,
  Id,
  UserId,
  GameId,
  PlatformId,
  Started,
}
