use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Games::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Games::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Games::Name).string().not_null().unique_key())
          .col(ColumnDef::new(Games::SteamId).big_integer().null())
          .col(ColumnDef::new(Games::SgdbId).big_integer().null())
          .col(ColumnDef::new(Games::ReleaseYear).integer().null())
          .to_owned(),
      )
      .await?;

    // aliases live in their own table so the unique index spans all games
    manager
      .create_table(
        Table::create()
          .table(GameAliases::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(GameAliases::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(GameAliases::GameId).integer().not_null())
          .col(
            ColumnDef::new(GameAliases::Alias)
              .string()
              .not_null()
              .unique_key(),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_game_aliases_game")
              .from(GameAliases::Table, GameAliases::GameId)
              .to(Games::Table, Games::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_game_aliases_game")
          .table(GameAliases::Table)
          .col(GameAliases::GameId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(GameAliases::Table).to_owned())
      .await?;
    manager.drop_table(Table::drop().table(Games::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Games {
  Table,
  Id,
  Name,
  SteamId,
  SgdbId,
  ReleaseYear,
}

#[derive(DeriveIden)]
pub enum GameAliases {
  Table,
  Id,
  GameId,
  Alias,
}
