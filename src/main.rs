//! Playtime tracker
//!
//! Architecture:
//! - SeaORM for the session store (SQLite)
//! - A reconciliation loop draining the legacy tracker's staging store
//! - Teloxide for the chat commands
//! - Axum for the read-only HTTP API

mod entity;
mod error;
mod plugins;
mod prelude;
mod reconcile;
mod staging;
mod state;
mod sv;
#[cfg(test)]
mod testing;
mod utils;

use std::sync::Arc;

use tracing_subscriber::{
  EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{
  plugins::{App, server, sync, telegram},
  prelude::*,
  state::{AppState, Config},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
      "timeplayed=debug,tower_http=debug,sea_orm=warn".into()
    }))
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config = Config::from_env()?;
  info!("Starting timeplayed v{}", env!("CARGO_PKG_VERSION"));

  let mut plugins = App::new().register(server::Plugin);

  match &config.telegram_token {
    Some(token) => plugins = plugins.register(telegram::Plugin::new(token)),
    None => warn!("TELOXIDE_TOKEN not set, chat commands disabled"),
  }

  match &config.staging_url {
    Some(url) => {
      let store = staging::Store::connect(url).await?;
      store.ensure_schema().await?;
      plugins = plugins.register(sync::Plugin::new(Arc::new(store)));
    }
    None => warn!("STAGING_DATABASE_URL not set, sync disabled"),
  }

  let app = Arc::new(AppState::new(config).await?);
  plugins.run(app).await;

  tokio::signal::ctrl_c().await.context("Failed to listen for ctrl-c")?;
  info!("Shutting down");
  Ok(())
}
