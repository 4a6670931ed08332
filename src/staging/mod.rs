//! Staging store: the legacy tracker's append-only log of completed
//! sessions, drained by the reconciliation loop.

pub mod entity;

use std::collections::HashSet;

use sea_orm::Schema;

use self::entity::{activity, game, user};
use crate::prelude::*;

/// A raw session report as the legacy tracker recorded it.
#[derive(Debug, Clone, PartialEq)]
pub struct Staged {
  pub id: i32,
  pub user_external_id: String,
  pub user_name: String,
  pub game_name: String,
  pub seconds: i64,
  pub ended_at: DateTime,
  pub platform_tag: String,
}

#[async_trait]
pub trait Staging: Send + Sync {
  /// Every record currently staged, oldest first.
  async fn snapshot(&self) -> Result<Vec<Staged>>;

  /// Deletes the given records, returning how many were removed.
  async fn remove(&self, ids: &[i32]) -> Result<u64>;
}

pub struct Store {
  db: DatabaseConnection,
}

impl Store {
  pub async fn connect(url: &str) -> anyhow::Result<Self> {
    info!("Connecting to staging database...");
    let db = Database::connect(url)
      .await
      .context("Failed to connect to staging database")?;
    Ok(Self { db })
  }

  /// Creates the legacy tables when they do not exist yet.
  pub async fn ensure_schema(&self) -> Result<()> {
    let backend = self.db.get_database_backend();
    let schema = Schema::new(backend);

    let mut tables = [
      schema.create_table_from_entity(user::Entity),
      schema.create_table_from_entity(game::Entity),
      schema.create_table_from_entity(activity::Entity),
    ];
    for stmt in tables.iter_mut() {
      stmt.if_not_exists();
      self.db.execute(backend.build(&*stmt)).await?;
    }
    Ok(())
  }

  #[cfg(test)]
  pub async fn stage(
    &self,
    user: (&str, &str),
    game_name: &str,
    seconds: i64,
    ended_at: DateTime,
    platform: &str,
  ) -> i32 {
    let (user_id, user_name) = user;
    if user::Entity::find_by_id(user_id).one(&self.db).await.unwrap().is_none()
    {
      user::ActiveModel { id: Set(user_id.into()), name: Set(user_name.into()) }
        .insert(&self.db)
        .await
        .unwrap();
    }

    let game = match game::Entity::find()
      .filter(game::Column::Name.eq(game_name))
      .one(&self.db)
      .await
      .unwrap()
    {
      Some(game) => game,
      None => game::ActiveModel {
        name: Set(game_name.into()),
        ..Default::default()
      }
      .insert(&self.db)
      .await
      .unwrap(),
    };

    activity::ActiveModel {
      timestamp: Set(ended_at),
      user_id: Set(user_id.into()),
      game_id: Set(game.id),
      seconds: Set(seconds),
      platform: Set(platform.into()),
      ..Default::default()
    }
    .insert(&self.db)
    .await
    .unwrap()
    .id
  }
}

#[async_trait]
impl Staging for Store {
  async fn snapshot(&self) -> Result<Vec<Staged>> {
    let activities = activity::Entity::find()
      .order_by_asc(activity::Column::Id)
      .all(&self.db)
      .await?;
    if activities.is_empty() {
      return Ok(Vec::new());
    }

    let user_ids: HashSet<&str> =
      activities.iter().map(|a| a.user_id.as_str()).collect();
    let game_ids: HashSet<i32> = activities.iter().map(|a| a.game_id).collect();

    let users: HashMap<String, String> = user::Entity::find()
      .filter(user::Column::Id.is_in(user_ids))
      .all(&self.db)
      .await?
      .into_iter()
      .map(|u| (u.id, u.name))
      .collect();
    let games: HashMap<i32, String> = game::Entity::find()
      .filter(game::Column::Id.is_in(game_ids))
      .all(&self.db)
      .await?
      .into_iter()
      .map(|g| (g.id, g.name))
      .collect();

    let mut staged = Vec::with_capacity(activities.len());
    for activity in activities {
      let (Some(user_name), Some(game_name)) =
        (users.get(&activity.user_id), games.get(&activity.game_id))
      else {
        warn!(
          "Staged activity {} references a missing user or game, leaving it",
          activity.id
        );
        continue;
      };

      staged.push(Staged {
        id: activity.id,
        user_external_id: activity.user_id,
        user_name: user_name.clone(),
        game_name: game_name.clone(),
        seconds: activity.seconds,
        ended_at: activity.timestamp,
        platform_tag: activity.platform,
      });
    }
    Ok(staged)
  }

  async fn remove(&self, ids: &[i32]) -> Result<u64> {
    if ids.is_empty() {
      return Ok(0);
    }
    let deleted = activity::Entity::delete_many()
      .filter(activity::Column::Id.is_in(ids.iter().copied()))
      .exec(&self.db)
      .await?;
    Ok(deleted.rows_affected)
  }
}
