//! Shared fixtures for database-backed tests.

use crate::{
  entity::{game, user},
  prelude::*,
  staging,
  state::{AppState, Config},
};

pub async fn setup_test_db() -> DatabaseConnection {
  let db = Database::connect("sqlite::memory:").await.unwrap();
  migration::Migrator::up(&db, None).await.unwrap();
  db
}

pub async fn setup_app() -> AppState {
  AppState::with_db(setup_test_db().await, Config::default())
}

pub async fn setup_store() -> staging::Store {
  let store = staging::Store::connect("sqlite::memory:").await.unwrap();
  store.ensure_schema().await.unwrap();
  store
}

pub async fn user(app: &AppState, id: &str) -> user::Model {
  app.sv().user.get_or_create(id, &format!("user{id}")).await.unwrap()
}

pub async fn game(app: &AppState, name: &str) -> game::Model {
  app.sv().game.find_or_create(name).await.unwrap()
}

/// Fixed instant used as "now" in tests that pass explicit timestamps.
pub fn at(hour: u32, min: u32) -> DateTime {
  chrono::NaiveDate::from_ymd_opt(2025, 3, 1)
    .and_then(|d| d.and_hms_opt(hour, min, 0))
    .unwrap()
}
