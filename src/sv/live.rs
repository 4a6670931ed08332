use crate::{
  entity::{game, live_session, platform, session, user},
  prelude::*,
  state::KeyLocks,
  sv,
};

/// Outcome of stopping a live session. The live slot is freed either way.
#[derive(Debug, Clone, PartialEq)]
pub enum Stopped {
  Saved(session::Model),
  /// Ended, but not saved: shorter than the minimum session length.
  TooShort { seconds: i64 },
}

/// Live session tracker: at most one running session per user.
pub struct Live<'a> {
  db: &'a DatabaseConnection,
  locks: &'a KeyLocks,
  min_secs: i64,
}

impl<'a> Live<'a> {
  pub fn new(
    db: &'a DatabaseConnection,
    locks: &'a KeyLocks,
    min_secs: i64,
  ) -> Self {
    Self { db, locks, min_secs }
  }

  pub async fn current(
    &self,
    user_id: &str,
  ) -> Result<Option<live_session::Model>> {
    let live = live_session::Entity::find()
      .filter(live_session::Column::UserId.eq(user_id))
      .one(self.db)
      .await?;
    Ok(live)
  }

  async fn running(&self, user_id: &str) -> Result<live_session::Model> {
    self.current(user_id).await?.ok_or(Error::NoActiveSession)
  }

  pub async fn start(
    &self,
    user: &user::Model,
    game: &game::Model,
    platform: Option<&platform::Model>,
    started: Option<DateTime>,
  ) -> Result<live_session::Model> {
    if self.current(&user.id).await?.is_some() {
      return Err(Error::AlreadyRunning);
    }

    let now = utils::now();
    let started = started.unwrap_or(now);
    if started > now {
      return Err(Error::InvalidArgs("Start time is in the future".into()));
    }

    let inserted = live_session::ActiveModel {
      user_id: Set(user.id.clone()),
      game_id: Set(game.id),
      platform_id: Set(platform.map_or(user.default_platform_id, |p| p.id)),
      started: Set(started),
      ..Default::default()
    }
    .insert(self.db)
    .await;

    match inserted {
      Ok(live) => {
        info!("User {} started playing {} at {}", user.id, game.name, started);
        Ok(live)
      }
      Err(err) if Error::is_unique_violation(&err) => {
        Err(Error::AlreadyRunning)
      }
      Err(err) => Err(err.into()),
    }
  }

  /// Seconds since the running session started.
  pub async fn elapsed(&self, user_id: &str) -> Result<i64> {
    let live = self.running(user_id).await?;
    Ok(utils::seconds_between(live.started, utils::now()))
  }

  /// Stops the running session and commits it. The session insert and the
  /// removal of the live row happen in one transaction.
  pub async fn stop(&self, user: &user::Model) -> Result<Stopped> {
    let live = self.running(&user.id).await?;
    let now = utils::now();
    let seconds = utils::seconds_between(live.started, now);

    let pipeline = sv::Session::new(self.db, self.locks, self.min_secs);
    let platform = sv::Platform::new(self.db).get(live.platform_id).await?;

    let candidate = match pipeline
      .prepare(user, live.game_id, seconds, Some(&platform), Some(now))
      .await
    {
      Ok(candidate) => candidate,
      Err(Error::TooShort { seconds, .. }) => {
        self.discard(&live).await?;
        info!("User {} stopped after {}s, not saved", user.id, seconds);
        return Ok(Stopped::TooShort { seconds });
      }
      Err(err) => {
        self.discard(&live).await?;
        return Err(err);
      }
    };

    let committed = {
      let _guard = self.locks.lock(candidate.key()).await;
      self.convert(&live, &candidate).await
    };

    match committed {
      Ok(session) => {
        info!(
          "User {} stopped, saved session {} ({}s)",
          user.id, session.id, session.seconds
        );
        Ok(Stopped::Saved(session))
      }
      Err(Error::NoActiveSession) => Err(Error::NoActiveSession),
      Err(err) => {
        error!("Failed to save live session of user {}: {}", user.id, err);
        self.discard(&live).await?;
        Err(err)
      }
    }
  }

  async fn convert(
    &self,
    live: &live_session::Model,
    candidate: &sv::Candidate,
  ) -> Result<session::Model> {
    let txn = self.db.begin().await?;

    // a concurrent stop or abort already consumed the live row
    let deleted =
      live_session::Entity::delete_by_id(live.id).exec(&txn).await?;
    if deleted.rows_affected == 0 {
      txn.rollback().await?;
      return Err(Error::NoActiveSession);
    }

    match sv::Session::persist(&txn, candidate).await {
      Ok(session) => {
        txn.commit().await?;
        Ok(session)
      }
      Err(err) => {
        txn.rollback().await?;
        Err(err)
      }
    }
  }

  async fn discard(&self, live: &live_session::Model) -> Result<()> {
    live_session::Entity::delete_by_id(live.id).exec(self.db).await?;
    Ok(())
  }

  /// Drops the running session without committing anything.
  pub async fn abort(&self, user_id: &str) -> Result<live_session::Model> {
    let live = self.running(user_id).await?;
    self.discard(&live).await?;
    info!("User {} aborted their live session", user_id);
    Ok(live)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing;

  #[tokio::test]
  async fn test_start_twice_is_rejected() {
    let app = testing::setup_app().await;
    let sv = app.sv();
    let user = testing::user(&app, "1").await;
    let game = testing::game(&app, "Celeste").await;

    sv.live.start(&user, &game, None, None).await.unwrap();
    assert!(matches!(
      sv.live.start(&user, &game, None, None).await,
      Err(Error::AlreadyRunning)
    ));

    // other users are independent
    let other = testing::user(&app, "2").await;
    sv.live.start(&other, &game, None, None).await.unwrap();
  }

  #[tokio::test]
  async fn test_idle_operations_fail() {
    let app = testing::setup_app().await;
    let sv = app.sv();
    let user = testing::user(&app, "1").await;

    assert!(matches!(sv.live.stop(&user).await, Err(Error::NoActiveSession)));
    assert!(matches!(
      sv.live.elapsed(&user.id).await,
      Err(Error::NoActiveSession)
    ));
    assert!(matches!(
      sv.live.abort(&user.id).await,
      Err(Error::NoActiveSession)
    ));
  }

  #[tokio::test]
  async fn test_start_rejects_future() {
    let app = testing::setup_app().await;
    let user = testing::user(&app, "1").await;
    let game = testing::game(&app, "Celeste").await;
    let later = utils::now() + TimeDelta::hours(1);

    assert!(matches!(
      app.sv().live.start(&user, &game, None, Some(later)).await,
      Err(Error::InvalidArgs(_))
    ));
  }

  #[tokio::test]
  async fn test_stop_commits_and_frees_slot() {
    let app = testing::setup_app().await;
    let sv = app.sv();
    let user = testing::user(&app, "1").await;
    let game = testing::game(&app, "Celeste").await;
    let switch = sv.platform.find_or_create("switch").await.unwrap();
    let started = utils::now() - TimeDelta::hours(2);

    sv.live.start(&user, &game, Some(&switch), Some(started)).await.unwrap();
    let elapsed = sv.live.elapsed(&user.id).await.unwrap();
    assert!((7199..=7201).contains(&elapsed));

    let Stopped::Saved(session) = sv.live.stop(&user).await.unwrap() else {
      panic!("expected a saved session");
    };
    assert!((7199..=7201).contains(&session.seconds));
    assert_eq!(session.game_id, game.id);
    assert_eq!(session.platform_id, switch.id);

    assert!(sv.live.current(&user.id).await.unwrap().is_none());
    assert_eq!(sv.session.recent(&user.id, 10).await.unwrap(), vec![session]);
  }

  #[tokio::test]
  async fn test_stop_too_short_frees_slot() {
    let app = testing::setup_app().await;
    let sv = app.sv();
    let user = testing::user(&app, "1").await;
    let game = testing::game(&app, "Celeste").await;

    sv.live.start(&user, &game, None, None).await.unwrap();

    assert!(matches!(
      sv.live.stop(&user).await.unwrap(),
      Stopped::TooShort { .. }
    ));
    assert!(sv.live.current(&user.id).await.unwrap().is_none());
    assert!(sv.session.recent(&user.id, 10).await.unwrap().is_empty());

    // idle again, a new session can start
    sv.live.start(&user, &game, None, None).await.unwrap();
  }

  #[tokio::test]
  async fn test_stop_resolves_generic_pc() {
    let app = testing::setup_app().await;
    let sv = app.sv();
    let user = testing::user(&app, "1").await;
    let game = testing::game(&app, "Celeste").await;
    let started = utils::now() - TimeDelta::minutes(30);

    // default platform is the generic "pc"
    let live = sv.live.start(&user, &game, None, Some(started)).await.unwrap();
    assert_eq!(live.platform_id, user.default_platform_id);

    let Stopped::Saved(session) = sv.live.stop(&user).await.unwrap() else {
      panic!("expected a saved session");
    };
    let win = sv.platform.by_abbreviation("win").await.unwrap().unwrap();
    assert_eq!(session.platform_id, win.id);
  }

  #[tokio::test]
  async fn test_stop_store_failure_frees_slot() {
    let app = testing::setup_app().await;
    let sv = app.sv();
    let user = testing::user(&app, "1").await;
    let game = testing::game(&app, "Celeste").await;
    let started = utils::now() - TimeDelta::hours(1);

    sv.live.start(&user, &game, None, Some(started)).await.unwrap();
    app.db.execute_unprepared("DROP TABLE sessions").await.unwrap();

    assert!(matches!(sv.live.stop(&user).await, Err(Error::Database(_))));
    assert!(sv.live.current(&user.id).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_abort_discards() {
    let app = testing::setup_app().await;
    let sv = app.sv();
    let user = testing::user(&app, "1").await;
    let game = testing::game(&app, "Celeste").await;
    let started = utils::now() - TimeDelta::hours(1);

    sv.live.start(&user, &game, None, Some(started)).await.unwrap();
    let aborted = sv.live.abort(&user.id).await.unwrap();

    assert_eq!(aborted.game_id, game.id);
    assert!(sv.live.current(&user.id).await.unwrap().is_none());
    assert!(sv.session.recent(&user.id, 10).await.unwrap().is_empty());
  }
}
