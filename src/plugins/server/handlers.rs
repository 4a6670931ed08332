use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

use crate::{
  entity::{live_session, session},
  prelude::*,
  state::AppState,
};

const DEFAULT_LIMIT: u64 = 20;
const MAX_LIMIT: u64 = 100;

#[derive(Debug, Serialize)]
pub struct HealthRes {
  pub status: &'static str,
  /// Session keys with a commit in flight
  pub pending_commits: usize,
}

pub async fn health(State(app): State<Arc<AppState>>) -> Json<HealthRes> {
  Json(HealthRes { status: "ok", pending_commits: app.locks.len() })
}

#[derive(Debug, Deserialize)]
pub struct SessionsQuery {
  pub limit: Option<u64>,
}

pub async fn sessions(
  State(app): State<Arc<AppState>>,
  Path(user_id): Path<String>,
  Query(query): Query<SessionsQuery>,
) -> Result<Json<Vec<session::Model>>> {
  let sv = app.sv();
  let user = sv.user.get(&user_id).await?;

  let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
  Ok(Json(sv.session.recent(&user.id, limit).await?))
}

#[derive(Debug, Serialize)]
pub struct LiveRes {
  #[serde(flatten)]
  pub live: live_session::Model,
  pub elapsed: i64,
}

pub async fn live(
  State(app): State<Arc<AppState>>,
  Path(user_id): Path<String>,
) -> Result<Json<Option<LiveRes>>> {
  let sv = app.sv();
  let user = sv.user.get(&user_id).await?;

  let live = sv.live.current(&user.id).await?.map(|live| LiveRes {
    elapsed: utils::seconds_between(live.started, utils::now()),
    live,
  });
  Ok(Json(live))
}

#[cfg(test)]
mod tests {
  use axum::http::StatusCode;

  use super::*;
  use crate::testing;

  #[tokio::test]
  async fn test_sessions_newest_first_and_limited() {
    let app = Arc::new(testing::setup_app().await);
    let sv = app.sv();
    let user = testing::user(&app, "1").await;
    let game = testing::game(&app, "Celeste").await;
    let hades = testing::game(&app, "Hades").await;

    sv.session
      .commit(&user, &game, 600, None, Some(testing::at(9, 0)))
      .await
      .unwrap();
    sv.session
      .commit(&user, &hades, 600, None, Some(testing::at(10, 0)))
      .await
      .unwrap();

    let Json(all) = sessions(
      State(app.clone()),
      Path("1".into()),
      Query(SessionsQuery { limit: None }),
    )
    .await
    .unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].game_id, hades.id);

    let Json(one) = sessions(
      State(app.clone()),
      Path("1".into()),
      Query(SessionsQuery { limit: Some(1) }),
    )
    .await
    .unwrap();
    assert_eq!(one.len(), 1);
  }

  #[tokio::test]
  async fn test_unknown_user_is_not_found() {
    let app = Arc::new(testing::setup_app().await);

    let err = live(State(app), Path("nobody".into())).await.unwrap_err();
    assert!(matches!(err, Error::UserNotFound));
    assert_eq!(
      axum::response::IntoResponse::into_response(err).status(),
      StatusCode::NOT_FOUND
    );
  }

  #[tokio::test]
  async fn test_live_reports_elapsed() {
    let app = Arc::new(testing::setup_app().await);
    let user = testing::user(&app, "1").await;
    let game = testing::game(&app, "Celeste").await;

    let Json(idle) = live(State(app.clone()), Path("1".into())).await.unwrap();
    assert!(idle.is_none());

    let started = utils::now() - TimeDelta::minutes(10);
    app.sv().live.start(&user, &game, None, Some(started)).await.unwrap();

    let Json(running) =
      live(State(app.clone()), Path("1".into())).await.unwrap();
    let running = running.unwrap();
    assert_eq!(running.live.game_id, game.id);
    assert!((599..=601).contains(&running.elapsed));
  }
}
