//! Background service deleting expired artifacts.
//!
//! Completed jobs older than the configured age lose their file: the file is
//! removed from disk and the job's path is cleared to the empty string, which
//! clients read as "expired".

use std::io::ErrorKind;

use chrono::Utc;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use reclip_store::DynJobRepository;

use crate::config::RetentionConfig;
use crate::metrics;

/// Retention sweeper service.
pub struct RetentionSweeper {
    jobs: DynJobRepository,
    config: RetentionConfig,
}

impl RetentionSweeper {
    pub fn new(jobs: DynJobRepository, config: RetentionConfig) -> Self {
        Self { jobs, config }
    }

    /// Start the sweep loop. Runs indefinitely; spawn it as a task.
    pub async fn run(&self) {
        if !self.config.enabled {
            info!("Artifact retention is disabled");
            return;
        }

        info!(
            "Starting retention sweeper (interval: {:?}, max age: {:?})",
            self.config.interval, self.config.max_age
        );

        let mut ticker = interval(self.config.interval);

        loop {
            ticker.tick().await;

            match self.sweep_once().await {
                Ok(0) => debug!("Retention sweep found nothing to purge"),
                Ok(purged) => info!(purged, "Retention sweep complete"),
                Err(e) => error!("Retention sweep error: {}", e),
            }
        }
    }

    /// Run a single sweep. Returns the number of jobs whose artifact was
    /// purged.
    pub async fn sweep_once(&self) -> anyhow::Result<usize> {
        let cutoff = Utc::now() - chrono::Duration::from_std(self.config.max_age)?;
        let expired = self.jobs.find_completed_before(cutoff).await?;

        let mut purged = 0;
        for job in expired {
            let Some(path) = job.downloadable_path() else {
                continue;
            };

            match tokio::fs::remove_file(path).await {
                Ok(()) => debug!(job_id = %job.external_id, path, "Deleted expired artifact"),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(job_id = %job.external_id, path, "Expired artifact already gone")
                }
                Err(e) => {
                    warn!(job_id = %job.external_id, path, "Failed to delete artifact: {}", e);
                    continue;
                }
            }

            if self.jobs.clear_file_path(&job.external_id).await? {
                purged += 1;
            }
        }

        metrics::record_retention_purged(purged);
        Ok(purged)
    }
}
