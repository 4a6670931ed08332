use std::{fmt, str::FromStr};

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Concrete OS platform that generic "pc" reports are attributed to.
#[derive(
  Clone,
  Copy,
  Debug,
  Default,
  PartialEq,
  Eq,
  EnumIter,
  DeriveActiveEnum,
  Serialize,
  Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum PcPlatform {
  #[default]
  #[sea_orm(string_value = "win")]
  Win,
  #[sea_orm(string_value = "mac")]
  Mac,
  #[sea_orm(string_value = "linux")]
  Linux,
}

impl PcPlatform {
  pub fn abbreviation(self) -> &'static str {
    match self {
      Self::Win => "win",
      Self::Mac => "mac",
      Self::Linux => "linux",
    }
  }
}

impl fmt::Display for PcPlatform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.abbreviation())
  }
}

impl FromStr for PcPlatform {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "win" => Ok(Self::Win),
      "mac" => Ok(Self::Mac),
      "linux" => Ok(Self::Linux),
      other => Err(format!("unknown PC platform `{other}`")),
    }
  }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
  /// External (chat platform) user id
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: String,
  pub name: String,
  pub default_platform_id: i32,
  pub pc_platform: PcPlatform,
  pub commands_blocked: bool,
  pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "super::platform::Entity",
    from = "Column::DefaultPlatformId",
    to = "super::platform::Column::Id"
  )]
  DefaultPlatform,
  #[sea_orm(has_many = "super::session::Entity")]
  Sessions,
  #[sea_orm(has_one = "super::live_session::Entity")]
  LiveSession,
}

impl Related<super::session::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Sessions.def()
  }
}

impl Related<super::live_session::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::LiveSession.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
