use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Platforms::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Platforms::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(
            ColumnDef::new(Platforms::Abbreviation)
              .string()
              .not_null()
              .unique_key(),
          )
          .col(ColumnDef::new(Platforms::Name).string().null())
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Platforms::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Platforms {
  Table,
  Id,
  Abbreviation,
  Name,
}
