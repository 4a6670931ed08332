//! Committed play session. `timestamp` marks the end of the session, so it
//! spans `[timestamp - seconds, timestamp]`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub user_id: String,
  pub game_id: i32,
  pub platform_id: i32,
  pub seconds: i64,
  pub timestamp: DateTime,
  pub emulated: bool,
}

impl Model {
  pub fn started(&self) -> DateTime {
    self.timestamp - chrono::TimeDelta::seconds(self.seconds)
  }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "super::user::Entity",
    from = "Column::UserId",
    to = "super::user::Column::Id"
  )]
  User,
  #[sea_orm(
    belongs_to = "super::game::Entity",
    from = "Column::GameId",
    to = "super::game::Column::Id"
  )]
  Game,
  #[sea_orm(
    belongs_to = "super::platform::Entity",
    from = "Column::PlatformId",
    to = "super::platform::Column::Id"
  )]
  Platform,
}

impl Related<super::user::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::User.def()
  }
}

impl Related<super::game::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Game.def()
  }
}

impl Related<super::platform::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Platform.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
