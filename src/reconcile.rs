//! Absorbs staged session reports into the session store.
//!
//! A record is removed from staging only once it is handled: committed,
//! or skipped as too short. Failed records stay staged and are retried on
//! the next pass. Re-absorbing a record after a crash is harmless, since
//! entity resolution is idempotent and the commit overlap rule collapses
//! the duplicate into the existing session.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::{
  prelude::*,
  staging::{Staged, Staging},
  state::AppState,
  sv::game::normalize_name,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Absorbed {
  Committed(i32),
  Skipped,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Drained {
  pub absorbed: usize,
  pub skipped: usize,
  pub failed: usize,
  pub removed: u64,
}

/// Maps one staged record onto internal entities and commits it.
pub async fn absorb(app: &AppState, record: &Staged) -> Result<Absorbed> {
  let sv = app.sv();
  let min = app.config.min_session_secs;

  if record.seconds < min {
    info!(
      "Skipping too short staged session {} ({}s)",
      record.id, record.seconds
    );
    return Ok(Absorbed::Skipped);
  }

  let user = sv
    .user
    .get_or_create(&record.user_external_id, &record.user_name)
    .await?;
  let game = sv.game.resolve(&normalize_name(&record.game_name)).await?;
  let platform = sv.platform.for_user(&user, &record.platform_tag).await?;

  let committed = sv
    .session
    .commit(
      &user,
      &game,
      record.seconds,
      Some(&platform),
      Some(record.ended_at),
    )
    .await;

  match committed {
    Ok(session) => Ok(Absorbed::Committed(session.id)),
    Err(Error::TooShort { .. }) => Ok(Absorbed::Skipped),
    Err(err) => Err(err),
  }
}

/// One reconciliation pass over everything currently staged.
pub async fn drain(app: &AppState, staging: &dyn Staging) -> Result<Drained> {
  let records = staging.snapshot().await?;
  let mut report = Drained::default();
  let mut handled = Vec::with_capacity(records.len());

  for record in &records {
    debug!("Syncing staged session: {:?}", record);

    let outcome = AssertUnwindSafe(absorb(app, record)).catch_unwind().await;
    match outcome {
      Ok(Ok(Absorbed::Committed(id))) => {
        debug!("Staged session {} synced as session {}", record.id, id);
        report.absorbed += 1;
        handled.push(record.id);
      }
      Ok(Ok(Absorbed::Skipped)) => {
        report.skipped += 1;
        handled.push(record.id);
      }
      Ok(Err(err)) => {
        error!("Error when syncing staged session {}: {}", record.id, err);
        report.failed += 1;
      }
      Err(_) => {
        error!("Panic when syncing staged session {}", record.id);
        report.failed += 1;
      }
    }
  }

  report.removed = staging.remove(&handled).await?;
  Ok(report)
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;
  use crate::{
    entity::session,
    testing::{self, setup_store},
  };

  async fn all_sessions(app: &AppState) -> Vec<session::Model> {
    session::Entity::find().all(&app.db).await.unwrap()
  }

  #[tokio::test]
  async fn test_generic_pc_lands_on_preference() {
    let app = testing::setup_app().await;
    let store = setup_store().await;

    let user = app.sv().user.get_or_create("42", "someone").await.unwrap();
    app
      .sv()
      .user
      .set_pc_platform(&user.id, crate::entity::PcPlatform::Mac)
      .await
      .unwrap();
    store
      .stage(("42", "someone"), "Celeste", 1850, testing::at(12, 0), "pc")
      .await;

    let report = drain(&app, &store).await.unwrap();
    assert_eq!(
      report,
      Drained { absorbed: 1, skipped: 0, failed: 0, removed: 1 }
    );

    let mac =
      app.sv().platform.by_abbreviation("mac").await.unwrap().unwrap();
    let celeste = app.sv().game.by_name("Celeste").await.unwrap().unwrap();
    let sessions = all_sessions(&app).await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].platform_id, mac.id);
    assert_eq!(sessions[0].game_id, celeste.id);
    assert_eq!(sessions[0].seconds, 1850);
    assert_eq!(sessions[0].timestamp, testing::at(12, 0));
    assert!(store.snapshot().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_creates_entities_on_demand() {
    let app = testing::setup_app().await;
    let store = setup_store().await;
    store
      .stage(("7", "seven"), "Hades with Medal", 900, testing::at(9, 0), "PS5")
      .await;

    drain(&app, &store).await.unwrap();

    let sv = app.sv();
    let user = sv.user.get("7").await.unwrap();
    assert_eq!(user.name, "seven");
    assert!(sv.game.by_name("Hades").await.unwrap().is_some());
    let ps5 = sv.platform.by_abbreviation("ps5").await.unwrap().unwrap();
    assert_eq!(all_sessions(&app).await[0].platform_id, ps5.id);
  }

  #[tokio::test]
  async fn test_resolves_game_by_alias() {
    let app = testing::setup_app().await;
    let store = setup_store().await;
    let game = testing::game(&app, "The Legend of Zelda").await;
    app.sv().game.add_alias(game.id, "zelda").await.unwrap();

    store.stage(("1", "a"), "zelda", 900, testing::at(9, 0), "switch").await;
    drain(&app, &store).await.unwrap();

    assert_eq!(all_sessions(&app).await[0].game_id, game.id);
    assert!(app.sv().game.by_name("zelda").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_short_records_are_dropped_without_sessions() {
    let app = testing::setup_app().await;
    let store = setup_store().await;
    store.stage(("1", "a"), "Celeste", 5, testing::at(9, 0), "pc").await;

    let report = drain(&app, &store).await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.removed, 1);
    assert!(all_sessions(&app).await.is_empty());
    assert!(app.sv().user.by_id("1").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_replayed_record_collapses() {
    let app = testing::setup_app().await;
    let store = setup_store().await;

    store.stage(("1", "a"), "Celeste", 1800, testing::at(12, 0), "pc").await;
    drain(&app, &store).await.unwrap();
    // crash before deletion: the same report shows up again
    store.stage(("1", "a"), "Celeste", 1800, testing::at(12, 0), "pc").await;
    drain(&app, &store).await.unwrap();
    // and then again, grown
    store.stage(("1", "a"), "Celeste", 3600, testing::at(12, 30), "pc").await;
    drain(&app, &store).await.unwrap();

    let sessions = all_sessions(&app).await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].seconds, 3600);
    assert_eq!(sessions[0].timestamp, testing::at(12, 30));
  }

  /// In-memory staging that can be told to fail removals.
  struct Fake {
    records: Mutex<Vec<Staged>>,
    fail_remove: bool,
  }

  #[async_trait]
  impl Staging for Fake {
    async fn snapshot(&self) -> Result<Vec<Staged>> {
      Ok(self.records.lock().unwrap().clone())
    }

    async fn remove(&self, ids: &[i32]) -> Result<u64> {
      if self.fail_remove {
        let err = sea_orm::DbErr::Custom("staging unavailable".into());
        return Err(err.into());
      }
      let mut records = self.records.lock().unwrap();
      let before = records.len();
      records.retain(|r| !ids.contains(&r.id));
      Ok((before - records.len()) as u64)
    }
  }

  fn staged(id: i32, game_name: &str, seconds: i64) -> Staged {
    Staged {
      id,
      user_external_id: "1".into(),
      user_name: "a".into(),
      game_name: game_name.into(),
      seconds,
      ended_at: testing::at(10, id as u32),
      platform_tag: "pc".into(),
    }
  }

  #[tokio::test]
  async fn test_failed_record_is_left_staged() {
    let app = testing::setup_app().await;
    // an empty name cannot become a game
    let fake = Fake {
      records: Mutex::new(vec![
        staged(1, "Celeste", 600),
        staged(2, "   ", 600),
        staged(3, "Hades", 600),
      ]),
      fail_remove: false,
    };

    let report = drain(&app, &fake).await.unwrap();
    assert_eq!(
      report,
      Drained { absorbed: 2, skipped: 0, failed: 1, removed: 2 }
    );

    let left: Vec<i32> =
      fake.snapshot().await.unwrap().iter().map(|r| r.id).collect();
    assert_eq!(left, vec![2]);

    // retried, and still failing, on the next pass
    let report = drain(&app, &fake).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.removed, 0);
    assert_eq!(all_sessions(&app).await.len(), 2);
  }

  #[tokio::test]
  async fn test_failed_removal_is_safe_to_replay() {
    let app = testing::setup_app().await;
    let fake = Fake {
      records: Mutex::new(vec![staged(1, "Celeste", 600)]),
      fail_remove: true,
    };

    assert!(drain(&app, &fake).await.is_err());
    assert!(drain(&app, &fake).await.is_err());

    // absorbed twice, stored once
    assert_eq!(all_sessions(&app).await.len(), 1);
    assert_eq!(fake.snapshot().await.unwrap().len(), 1);
  }
}
