//! Database migrations using SeaORM

pub use sea_orm_migration::prelude::*;

mod m20261001_000001_create_platforms;
mod m20261001_000002_create_users;
mod m20261001_000003_create_games;
mod m20261001_000004_create_sessions;
mod m20261001_000005_create_live_sessions;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
  fn migrations() -> Vec<Box<dyn MigrationTrait>> {
    vec![
      Box::new(m20261001_000001_create_platforms::Migration),
      Box::new(m20261001_000002_create_users::Migration),
      Box::new(m20261001_000003_create_games::Migration),
      Box::new(m20261001_000004_create_sessions::Migration),
      Box::new(m20261001_000005_create_live_sessions::Migration),
    ]
  }
}
