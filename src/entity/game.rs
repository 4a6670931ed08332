use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "games")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  #[sea_orm(unique)]
  pub name: String,
  pub steam_id: Option<i64>,
  /// SteamGridDB catalog id
  pub sgdb_id: Option<i64>,
  pub release_year: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "super::game_alias::Entity")]
  Aliases,
  #[sea_orm(has_many = "super::session::Entity")]
  Sessions,
}

impl Related<super::game_alias::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Aliases.def()
  }
}

impl Related<super::session::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Sessions.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
