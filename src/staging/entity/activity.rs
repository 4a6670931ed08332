use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "activity")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  /// End of the reported session
  pub timestamp: DateTime,
  pub user_id: String,
  pub game_id: i32,
  pub seconds: i64,
  pub platform: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
