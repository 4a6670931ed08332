use std::sync::Arc;

use crate::{prelude::*, reconcile, staging::Staging, state::AppState};

/// Reconciliation loop: drains the staging store every sync interval.
pub struct Plugin {
  staging: Arc<dyn Staging>,
}

impl Plugin {
  pub fn new(staging: Arc<dyn Staging>) -> Self {
    Self { staging }
  }
}

#[async_trait]
impl super::Plugin for Plugin {
  fn name(&self) -> &'static str {
    "sync"
  }

  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let interval = app.config.sync_interval;
    info!(
      "Syncing staged sessions every {}",
      humantime::format_duration(interval)
    );

    loop {
      match reconcile::drain(&app, self.staging.as_ref()).await {
        Ok(report) if report.absorbed + report.skipped + report.failed > 0 => {
          info!(
            "Synced staged sessions: {} absorbed, {} skipped, {} failed, {} removed",
            report.absorbed, report.skipped, report.failed, report.removed
          );
        }
        Ok(_) => {}
        Err(err) => error!("Sync iteration failed: {}", err),
      }

      time::sleep(interval).await;
    }
  }
}
