//! Session commit pipeline.
//!
//! A commit is split in two phases. [`Session::prepare`] validates the
//! duration and resolves the platform and timestamp without writing
//! anything but lazily created platforms. [`Session::persist`] then runs on
//! a transaction, under the per-key lock, and applies the overlap rule:
//! when the new session starts before the most recent prior session of the
//! same (user, game, platform) ended, the prior row is a partial report of
//! the same play and is replaced.

use crate::{
  entity::{GENERIC_PC, game, platform, session, user},
  prelude::*,
  state::{KeyLocks, SessionKey},
  sv,
};

/// A validated session with every reference resolved, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
  pub user_id: String,
  pub game_id: i32,
  pub platform_id: i32,
  pub seconds: i64,
  /// End of the session
  pub timestamp: DateTime,
}

impl Candidate {
  pub fn key(&self) -> SessionKey {
    (self.user_id.clone(), self.game_id, self.platform_id)
  }
}

pub struct Session<'a> {
  db: &'a DatabaseConnection,
  locks: &'a KeyLocks,
  min_secs: i64,
}

impl<'a> Session<'a> {
  pub fn new(
    db: &'a DatabaseConnection,
    locks: &'a KeyLocks,
    min_secs: i64,
  ) -> Self {
    Self { db, locks, min_secs }
  }

  /// Commits a finished session of `seconds` ending at `timestamp` (now by
  /// default) on `platform` (the user's default by default).
  pub async fn commit(
    &self,
    user: &user::Model,
    game: &game::Model,
    seconds: i64,
    platform: Option<&platform::Model>,
    timestamp: Option<DateTime>,
  ) -> Result<session::Model> {
    let candidate =
      self.prepare(user, game.id, seconds, platform, timestamp).await?;

    let _guard = self.locks.lock(candidate.key()).await;
    let txn = self.db.begin().await?;
    let session = Self::persist(&txn, &candidate).await?;
    txn.commit().await?;

    info!(
      "Added session {} for user {}: {} on platform {} - {}s @ {}",
      session.id,
      user.id,
      game.name,
      session.platform_id,
      session.seconds,
      session.timestamp
    );
    Ok(session)
  }

  pub async fn prepare(
    &self,
    user: &user::Model,
    game_id: i32,
    seconds: i64,
    platform: Option<&platform::Model>,
    timestamp: Option<DateTime>,
  ) -> Result<Candidate> {
    if seconds < self.min_secs {
      return Err(Error::TooShort { seconds, minimum: self.min_secs });
    }

    let platforms = sv::Platform::new(self.db);
    let platform = match platform {
      Some(platform) => platform.clone(),
      None => platforms.get(user.default_platform_id).await?,
    };
    let platform = if platform.abbreviation == GENERIC_PC {
      platforms.for_user(user, GENERIC_PC).await?
    } else {
      platform
    };

    Ok(Candidate {
      user_id: user.id.clone(),
      game_id,
      platform_id: platform.id,
      seconds,
      timestamp: timestamp.unwrap_or_else(utils::now),
    })
  }

  /// Writes `candidate`, replacing the most recent prior session of the
  /// same key if the two overlap. Callers hold the key lock and commit the
  /// transaction behind `conn`.
  pub async fn persist<C: ConnectionTrait>(
    conn: &C,
    candidate: &Candidate,
  ) -> Result<session::Model> {
    let prior = session::Entity::find()
      .filter(session::Column::UserId.eq(candidate.user_id.as_str()))
      .filter(session::Column::GameId.eq(candidate.game_id))
      .filter(session::Column::PlatformId.eq(candidate.platform_id))
      .filter(session::Column::Timestamp.lte(candidate.timestamp))
      .order_by_desc(session::Column::Timestamp)
      .order_by_desc(session::Column::Id)
      .one(conn)
      .await?;

    if let Some(prior) = prior {
      let gap = utils::seconds_between(prior.timestamp, candidate.timestamp);
      if gap < candidate.seconds {
        info!(
          "Session {} ({}s @ {}) overlaps new {}s @ {}, replacing it",
          prior.id,
          prior.seconds,
          prior.timestamp,
          candidate.seconds,
          candidate.timestamp
        );
        session::Entity::delete_by_id(prior.id).exec(conn).await?;
      }
    }

    let session = session::ActiveModel {
      user_id: Set(candidate.user_id.clone()),
      game_id: Set(candidate.game_id),
      platform_id: Set(candidate.platform_id),
      seconds: Set(candidate.seconds),
      timestamp: Set(candidate.timestamp),
      emulated: Set(false),
      ..Default::default()
    }
    .insert(conn)
    .await?;

    Ok(session)
  }

  /// Sessions referencing the game. Guards game deletion.
  pub async fn count_for_game<C: ConnectionTrait>(
    conn: &C,
    game_id: i32,
  ) -> Result<u64> {
    let count = session::Entity::find()
      .filter(session::Column::GameId.eq(game_id))
      .count(conn)
      .await?;
    Ok(count)
  }

  /// Sessions referencing the platform. Guards platform deletion.
  pub async fn count_for_platform<C: ConnectionTrait>(
    conn: &C,
    platform_id: i32,
  ) -> Result<u64> {
    let count = session::Entity::find()
      .filter(session::Column::PlatformId.eq(platform_id))
      .count(conn)
      .await?;
    Ok(count)
  }

  pub async fn by_id(&self, id: i32) -> Result<Option<session::Model>> {
    Ok(session::Entity::find_by_id(id).one(self.db).await?)
  }

  /// Most recent sessions of a user, newest first.
  pub async fn recent(
    &self,
    user_id: &str,
    limit: u64,
  ) -> Result<Vec<session::Model>> {
    let sessions = session::Entity::find()
      .filter(session::Column::UserId.eq(user_id))
      .order_by_desc(session::Column::Timestamp)
      .limit(limit)
      .all(self.db)
      .await?;
    Ok(sessions)
  }

  async fn owned(&self, user_id: &str, id: i32) -> Result<session::Model> {
    let session = self.by_id(id).await?.ok_or(Error::SessionNotFound)?;
    if session.user_id != user_id {
      return Err(Error::NotOwner);
    }
    Ok(session)
  }

  pub async fn remove(&self, user_id: &str, id: i32) -> Result<()> {
    let session = self.owned(user_id, id).await?;
    session::Entity::delete_by_id(session.id).exec(self.db).await?;
    info!("Removed session {} of user {}", session.id, user_id);
    Ok(())
  }

  pub async fn toggle_emulated(
    &self,
    user_id: &str,
    id: i32,
  ) -> Result<session::Model> {
    let session = self.owned(user_id, id).await?;
    let emulated = !session.emulated;
    let session =
      session::ActiveModel { emulated: Set(emulated), ..session.into() }
        .update(self.db)
        .await?;
    Ok(session)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::{entity::PcPlatform, testing};

  async fn sessions_of(app: &crate::state::AppState) -> Vec<session::Model> {
    session::Entity::find()
      .order_by_asc(session::Column::Timestamp)
      .all(&app.db)
      .await
      .unwrap()
  }

  #[tokio::test]
  async fn test_too_short_writes_nothing() {
    let app = testing::setup_app().await;
    let user = testing::user(&app, "1").await;
    let game = testing::game(&app, "Celeste").await;

    for seconds in [-5, 0, 1, 59] {
      assert!(matches!(
        app.sv().session.commit(&user, &game, seconds, None, None).await,
        Err(Error::TooShort { minimum: 60, .. })
      ));
    }
    assert!(sessions_of(&app).await.is_empty());
  }

  #[tokio::test]
  async fn test_commit_stores_exact_duration() {
    let app = testing::setup_app().await;
    let sv = app.sv();
    let user = testing::user(&app, "1").await;
    let game = testing::game(&app, "Celeste").await;
    let switch = sv.platform.find_or_create("switch").await.unwrap();

    let session = sv
      .session
      .commit(&user, &game, 1850, Some(&switch), Some(testing::at(12, 0)))
      .await
      .unwrap();

    assert_eq!(session.seconds, 1850);
    assert_eq!(session.timestamp, testing::at(12, 0));
    assert_eq!(session.platform_id, switch.id);
    assert!(!session.emulated);
    assert_eq!(session.started(), testing::at(11, 29) + TimeDelta::seconds(10));
    assert_eq!(sessions_of(&app).await, vec![session]);
  }

  #[tokio::test]
  async fn test_generic_pc_resolves_to_preference() {
    let app = testing::setup_app().await;
    let sv = app.sv();
    let user = testing::user(&app, "42").await;
    let user =
      sv.user.set_pc_platform(&user.id, PcPlatform::Mac).await.unwrap();
    let game = testing::game(&app, "Celeste").await;
    assert!(sv.platform.by_abbreviation("mac").await.unwrap().is_none());

    // default platform of a new user is the generic one
    let session =
      sv.session.commit(&user, &game, 600, None, None).await.unwrap();

    let mac = sv.platform.by_abbreviation("mac").await.unwrap().unwrap();
    assert_eq!(session.platform_id, mac.id);

    let pc = sv.platform.by_abbreviation("pc").await.unwrap().unwrap();
    let session = sv
      .session
      .commit(&user, &game, 600, Some(&pc), Some(testing::at(20, 0)))
      .await
      .unwrap();
    assert_eq!(session.platform_id, mac.id);
  }

  #[tokio::test]
  async fn test_overlap_replaces_prior() {
    let app = testing::setup_app().await;
    let sv = app.sv();
    let user = testing::user(&app, "1").await;
    let game = testing::game(&app, "Celeste").await;

    sv.session
      .commit(&user, &game, 1800, None, Some(testing::at(12, 0)))
      .await
      .unwrap();
    // re-reported as it grew: starts 11:30, before the prior one ended
    let grown = sv
      .session
      .commit(&user, &game, 3600, None, Some(testing::at(12, 30)))
      .await
      .unwrap();

    assert_eq!(sessions_of(&app).await, vec![grown]);
  }

  #[tokio::test]
  async fn test_non_overlapping_sessions_are_kept() {
    let app = testing::setup_app().await;
    let sv = app.sv();
    let user = testing::user(&app, "1").await;
    let game = testing::game(&app, "Celeste").await;

    sv.session
      .commit(&user, &game, 1800, None, Some(testing::at(12, 0)))
      .await
      .unwrap();
    // gap of exactly the new duration touches but does not overlap
    sv.session
      .commit(&user, &game, 1800, None, Some(testing::at(12, 30)))
      .await
      .unwrap();

    assert_eq!(sessions_of(&app).await.len(), 2);
  }

  #[tokio::test]
  async fn test_overlap_is_scoped_to_key() {
    let app = testing::setup_app().await;
    let sv = app.sv();
    let user = testing::user(&app, "1").await;
    let other = testing::user(&app, "2").await;
    let celeste = testing::game(&app, "Celeste").await;
    let hades = testing::game(&app, "Hades").await;
    let switch = sv.platform.find_or_create("switch").await.unwrap();
    let at = Some(testing::at(12, 0));

    sv.session.commit(&user, &celeste, 600, None, at).await.unwrap();
    sv.session.commit(&user, &hades, 600, None, at).await.unwrap();
    sv.session.commit(&other, &celeste, 600, None, at).await.unwrap();
    sv.session.commit(&user, &celeste, 600, Some(&switch), at).await.unwrap();

    assert_eq!(sessions_of(&app).await.len(), 4);
  }

  #[tokio::test]
  async fn test_counts_for_delete_guards() {
    let app = testing::setup_app().await;
    let sv = app.sv();
    let user = testing::user(&app, "1").await;
    let celeste = testing::game(&app, "Celeste").await;
    let hades = testing::game(&app, "Hades").await;
    let switch = sv.platform.find_or_create("switch").await.unwrap();

    sv.session
      .commit(&user, &celeste, 600, Some(&switch), Some(testing::at(9, 0)))
      .await
      .unwrap();
    sv.session
      .commit(&user, &celeste, 600, None, Some(testing::at(12, 0)))
      .await
      .unwrap();

    assert_eq!(Session::count_for_game(&app.db, celeste.id).await.unwrap(), 2);
    assert_eq!(Session::count_for_game(&app.db, hades.id).await.unwrap(), 0);
    assert_eq!(
      Session::count_for_platform(&app.db, switch.id).await.unwrap(),
      1
    );
  }

  #[tokio::test]
  async fn test_late_older_report_keeps_newer_session() {
    let app = testing::setup_app().await;
    let sv = app.sv();
    let user = testing::user(&app, "1").await;
    let game = testing::game(&app, "Celeste").await;

    sv.session
      .commit(&user, &game, 3600, None, Some(testing::at(14, 0)))
      .await
      .unwrap();
    sv.session
      .commit(&user, &game, 3600, None, Some(testing::at(10, 0)))
      .await
      .unwrap();

    assert_eq!(sessions_of(&app).await.len(), 2);
  }

  #[tokio::test]
  async fn test_concurrent_duplicates_collapse() {
    let app = Arc::new(testing::setup_app().await);
    let user = testing::user(&app, "1").await;
    let game = testing::game(&app, "Celeste").await;

    let tasks: Vec<_> = (0..4)
      .map(|_| {
        let (app, user, game) = (app.clone(), user.clone(), game.clone());
        tokio::spawn(async move {
          app
            .sv()
            .session
            .commit(&user, &game, 900, None, Some(testing::at(12, 0)))
            .await
        })
      })
      .collect();

    for task in tasks {
      task.await.unwrap().unwrap();
    }

    let sessions = sessions_of(&app).await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].seconds, 900);
    assert_eq!(app.locks.len(), 0);
  }

  #[tokio::test]
  async fn test_remove_and_emulated_check_owner() {
    let app = testing::setup_app().await;
    let sv = app.sv();
    let user = testing::user(&app, "1").await;
    let game = testing::game(&app, "Celeste").await;
    let session =
      sv.session.commit(&user, &game, 600, None, None).await.unwrap();

    assert!(matches!(
      sv.session.toggle_emulated("2", session.id).await,
      Err(Error::NotOwner)
    ));
    assert!(matches!(
      sv.session.remove("2", session.id).await,
      Err(Error::NotOwner)
    ));

    let toggled = sv.session.toggle_emulated("1", session.id).await.unwrap();
    assert!(toggled.emulated);
    assert_eq!(sv.session.recent("1", 10).await.unwrap(), vec![toggled]);

    sv.session.remove("1", session.id).await.unwrap();
    assert!(matches!(
      sv.session.remove("1", session.id).await,
      Err(Error::SessionNotFound)
    ));
  }
}
