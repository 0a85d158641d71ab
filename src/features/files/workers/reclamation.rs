use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::core::config::ReclamationConfig;
use crate::core::error::Result;
use crate::features::files::models::File;
use crate::features::files::registry::{ExpiryCursor, FileRegistry};
use crate::modules::storage::StorageGateway;

/// Outcome of one sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReclamationReport {
    pub candidates: usize,
    pub reclaimed: usize,
    /// Storage refused the delete; the row stays for the next cycle
    pub deferred: usize,
    pub failed: usize,
}

/// Background sweep that deletes expired files from storage and the registry
pub struct ReclamationWorker {
    registry: Arc<dyn FileRegistry>,
    storage: Arc<dyn StorageGateway>,
    interval: Duration,
    batch_size: i64,
}

enum Outcome {
    Reclaimed,
    Deferred,
}

impl ReclamationWorker {
    pub fn new(
        registry: Arc<dyn FileRegistry>,
        storage: Arc<dyn StorageGateway>,
        config: &ReclamationConfig,
    ) -> Self {
        Self {
            registry,
            storage,
            interval: config.interval,
            batch_size: config.batch_size,
        }
    }

    /// Run the worker until `shutdown` flips to true
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "Starting reclamation worker (interval={}s, batch={})",
            self.interval.as_secs(),
            self.batch_size
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_cycle().await {
                        Ok(report) if report.candidates > 0 => tracing::info!(
                            "Reclamation cycle: candidates={}, reclaimed={}, deferred={}, failed={}",
                            report.candidates,
                            report.reclaimed,
                            report.deferred,
                            report.failed
                        ),
                        Ok(_) => tracing::debug!("Reclamation cycle: nothing expired"),
                        Err(e) => tracing::error!("Reclamation cycle failed: {:?}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Reclamation worker stopped");
                        return;
                    }
                }
            }
        }
    }

    /// One sweep over every file that expired before now, fetched in pages of
    /// `batch_size`. Each candidate is handled independently; the cursor moves
    /// past deferred and failed rows so they cannot starve later ones.
    pub async fn run_cycle(&self) -> Result<ReclamationReport> {
        let now = Utc::now();
        let page_size = self.batch_size.max(1);
        let mut cursor: Option<ExpiryCursor> = None;
        let mut report = ReclamationReport::default();

        loop {
            let page = self
                .registry
                .find_expired_before(now, cursor, page_size)
                .await?;
            report.candidates += page.len();

            for file in &page {
                match self.reclaim(file).await {
                    Ok(Outcome::Reclaimed) => report.reclaimed += 1,
                    Ok(Outcome::Deferred) => report.deferred += 1,
                    Err(e) => {
                        tracing::error!("Failed to reclaim file {}: {:?}", file.id, e);
                        report.failed += 1;
                    }
                }
            }

            if (page.len() as i64) < page_size {
                break;
            }
            cursor = page
                .last()
                .and_then(|file| file.expires_at.map(|at| (at, file.id)));
            if cursor.is_none() {
                break;
            }
        }

        Ok(report)
    }

    async fn reclaim(&self, file: &File) -> Result<Outcome> {
        self.registry.delete_download_events(file.id).await?;

        if let Err(e) = self.storage.delete(&file.storage_path).await {
            tracing::warn!(
                "Deferring reclamation of file {} (key '{}'): {}",
                file.id,
                file.storage_path,
                e
            );
            return Ok(Outcome::Deferred);
        }

        if let Err(e) = self.registry.delete(file.id).await {
            tracing::error!(
                "Object '{}' removed but row {} remains: {:?}",
                file.storage_path,
                file.id,
                e
            );
            return Err(e);
        }

        tracing::debug!("Reclaimed file {} ({})", file.id, file.storage_path);
        Ok(Outcome::Reclaimed)
    }
}
