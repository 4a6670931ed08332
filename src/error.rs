//! Error types for the session service

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};
use sea_orm::{DbErr, SqlErr};

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("Database error: {0}")]
  Database(#[from] DbErr),

  #[error("Session too short: {seconds}s (minimum is {minimum}s)")]
  TooShort { seconds: i64, minimum: i64 },

  #[error("A session is already running")]
  AlreadyRunning,

  #[error("No session is running")]
  NoActiveSession,

  #[error("User not found")]
  UserNotFound,

  #[error("Game not found")]
  GameNotFound,

  #[error("Platform not found")]
  PlatformNotFound,

  #[error("Session not found")]
  SessionNotFound,

  #[error("Session belongs to another user")]
  NotOwner,

  #[error("{0} is still referenced by sessions")]
  ReferentialConflict(String),

  #[error("`{0}` is already taken")]
  NameTaken(String),

  #[error("Alias `{alias}` is already used by `{game}`")]
  AliasTaken { alias: String, game: String },

  #[error("{0}")]
  InvalidArgs(String),
}

impl Error {
  /// Whether a database error comes from a unique index rejecting a row.
  pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
  }

  /// Message safe to show to an end user: store details stay in the logs.
  pub fn user_message(&self) -> String {
    match self {
      Error::Database(_) => "Database error, try again later".to_string(),
      other => other.to_string(),
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = match &self {
      Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
      Error::TooShort { .. } | Error::InvalidArgs(_) => StatusCode::BAD_REQUEST,
      Error::NotOwner => StatusCode::FORBIDDEN,
      Error::UserNotFound
      | Error::GameNotFound
      | Error::PlatformNotFound
      | Error::SessionNotFound
      | Error::NoActiveSession => StatusCode::NOT_FOUND,
      Error::AlreadyRunning
      | Error::ReferentialConflict(_)
      | Error::NameTaken(_)
      | Error::AliasTaken { .. } => StatusCode::CONFLICT,
    };

    let body = json::json!({
      "success": false,
      "error": self.user_message()
    });

    (status, axum::Json(body)).into_response()
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
