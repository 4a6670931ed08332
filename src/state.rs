use std::{collections::HashSet, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{prelude::*, sv};

#[derive(Debug, Clone)]
pub struct Config {
  pub database_url: String,
  /// Legacy tracker database drained by the reconciliation loop
  pub staging_url: Option<String>,
  pub min_session_secs: i64,
  pub sync_interval: Duration,
  pub admins: HashSet<String>,
  pub telegram_token: Option<String>,
  pub port: u16,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      database_url: String::from("sqlite:timeplayed.db?mode=rwc"),
      staging_url: None,

      min_session_secs: 60,
      sync_interval: Duration::from_secs(5),

      admins: HashSet::new(),
      telegram_token: None,
      port: 3000,
    }
  }
}

impl Config {
  pub fn from_env() -> anyhow::Result<Self> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  pub fn from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
  ) -> anyhow::Result<Self> {
    let mut config = Self::default();
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = var("DATABASE_URL") {
      config.database_url = url;
    }
    config.staging_url = var("STAGING_DATABASE_URL");
    config.telegram_token = var("TELOXIDE_TOKEN");

    if let Some(secs) = var("MIN_SESSION_SECS") {
      config.min_session_secs =
        secs.trim().parse().context("Invalid MIN_SESSION_SECS")?;
    }
    if let Some(interval) = var("SYNC_INTERVAL") {
      config.sync_interval = humantime::parse_duration(interval.trim())
        .context("Invalid SYNC_INTERVAL")?;
    }
    if let Some(port) = var("PORT") {
      config.port = port.trim().parse().context("Invalid PORT")?;
    }
    if let Some(admins) = var("ADMIN_IDS") {
      config.admins = admins
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect();
    }

    Ok(config)
  }
}

/// Serialization key of the commit pipeline: (user, game, platform).
pub type SessionKey = (String, i32, i32);

/// Keyed async mutexes. Entries exist only while someone holds or waits on
/// them.
#[derive(Default)]
pub struct KeyLocks {
  locks: DashMap<SessionKey, Arc<Mutex<()>>>,
}

pub struct KeyGuard<'a> {
  owner: &'a KeyLocks,
  key: SessionKey,
  guard: Option<OwnedMutexGuard<()>>,
}

impl KeyLocks {
  pub async fn lock(&self, key: SessionKey) -> KeyGuard<'_> {
    let mutex = self.locks.entry(key.clone()).or_default().clone();
    let guard = mutex.lock_owned().await;
    KeyGuard { owner: self, key, guard: Some(guard) }
  }

  pub fn len(&self) -> usize {
    self.locks.len()
  }
}

impl Drop for KeyGuard<'_> {
  fn drop(&mut self) {
    drop(self.guard.take());
    self
      .owner
      .locks
      .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
  }
}

pub struct Services<'a> {
  pub user: sv::User<'a>,
  pub platform: sv::Platform<'a>,
  pub game: sv::Game<'a>,
  pub session: sv::Session<'a>,
  pub live: sv::Live<'a>,
}

pub struct AppState {
  pub db: DatabaseConnection,
  pub config: Config,
  pub locks: KeyLocks,
}

impl AppState {
  pub async fn new(config: Config) -> anyhow::Result<Self> {
    info!("Connecting to database...");
    let db = Database::connect(&config.database_url)
      .await
      .context("Failed to connect to database")?;

    info!("Running migrations...");
    migration::Migrator::up(&db, None)
      .await
      .context("Failed to run migrations")?;

    Ok(Self::with_db(db, config))
  }

  pub fn with_db(db: DatabaseConnection, config: Config) -> Self {
    Self { db, config, locks: KeyLocks::default() }
  }

  pub fn sv(&self) -> Services<'_> {
    let min = self.config.min_session_secs;
    Services {
      user: sv::User::new(&self.db),
      platform: sv::Platform::new(&self.db),
      game: sv::Game::new(&self.db),
      session: sv::Session::new(&self.db, &self.locks, min),
      live: sv::Live::new(&self.db, &self.locks, min),
    }
  }

  pub fn is_admin(&self, user_id: &str) -> bool {
    self.config.admins.contains(user_id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_config_from_lookup() {
    let vars: HashMap<&str, &str> = HashMap::from([
      ("DATABASE_URL", "sqlite::memory:"),
      ("MIN_SESSION_SECS", "120"),
      ("SYNC_INTERVAL", "30s"),
      ("ADMIN_IDS", " 42, ,7 "),
      ("TELOXIDE_TOKEN", ""),
    ]);

    let config =
      Config::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

    assert_eq!(config.database_url, "sqlite::memory:");
    assert_eq!(config.min_session_secs, 120);
    assert_eq!(config.sync_interval, Duration::from_secs(30));
    assert_eq!(
      config.admins,
      HashSet::from(["42".to_string(), "7".to_string()])
    );
    assert!(config.telegram_token.is_none());
    assert!(config.staging_url.is_none());
    assert_eq!(config.port, 3000);
  }

  #[test]
  fn test_config_rejects_bad_interval() {
    let result = Config::from_lookup(|k| {
      (k == "SYNC_INTERVAL").then(|| "soon".to_string())
    });
    assert!(result.is_err());
  }

  #[tokio::test]
  async fn test_key_locks_are_released() {
    let locks = KeyLocks::default();
    let key = ("1".to_string(), 1, 1);

    {
      let _guard = locks.lock(key.clone()).await;
      assert_eq!(locks.len(), 1);
    }
    assert_eq!(locks.len(), 0);

    let first = locks.lock(key.clone()).await;
    let pending = tokio::time::timeout(
      Duration::from_millis(50),
      locks.lock(key.clone()),
    )
    .await;
    assert!(pending.is_err());
    drop(first);
    assert_eq!(locks.len(), 0);
  }
}
