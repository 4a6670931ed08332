//! Long-running services supervised by [`App`]: each one is restarted
//! after a short delay when it fails or stops.

pub mod server;
pub mod sync;
pub mod telegram;

use std::sync::Arc;

use crate::{prelude::*, state::AppState};

/// Delay before a failed service is started again.
const RESTART_DELAY: Duration = Duration::from_secs(5);

#[async_trait]
pub trait Plugin: Send + Sync {
  fn name(&self) -> &'static str {
    std::any::type_name::<Self>()
  }

  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()>;
}

pub struct App {
  plugins: Vec<Arc<dyn Plugin>>,
}

impl App {
  pub fn new() -> Self {
    Self { plugins: Vec::new() }
  }

  pub fn register<P: Plugin + 'static>(mut self, plugin: P) -> Self {
    self.plugins.push(Arc::new(plugin));
    self
  }

  pub async fn run(self, app: Arc<AppState>) {
    for plugin in self.plugins {
      let app = app.clone();

      tokio::spawn(async move {
        let name = plugin.name();
        info!("SYSTEM: Service `{}` initialized", name);

        loop {
          let app = app.clone();
          let plugin = plugin.clone();

          let handle = tokio::spawn(async move { plugin.start(app).await });

          match handle.await {
            Ok(Ok(())) => {
              warn!("Service `{name}` stopped unexpectedly (Ok).",);
            }
            Ok(Err(err)) => {
              error!("Service `{name}` crashed with error: {err:#}.",);
            }
            Err(join_err) => {
              if join_err.is_cancelled() {
                info!("Service `{}` shutdown.", name);
                break;
              } else {
                error!("Service `{}` PANICKED!", name);
              }
            }
          }

          time::sleep(RESTART_DELAY).await;
          info!("SYSTEM: Restarting service `{}`...", name);
        }
      });
    }
  }
}
