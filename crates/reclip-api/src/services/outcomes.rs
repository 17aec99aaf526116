//! Consumer for the executor's job outcome stream.

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use reclip_models::JobStatus;
use reclip_worker::JobOutcome;

use crate::metrics;

/// Log and count each finished job until the executor goes away.
pub async fn log_outcomes(mut outcomes: UnboundedReceiver<JobOutcome>) {
    while let Some(outcome) = outcomes.recv().await {
        metrics::record_job_outcome(outcome.status.as_str());

        let duration_ms = outcome.duration.as_millis() as u64;
        if outcome.status == JobStatus::Completed {
            info!(job_id = %outcome.job_id, duration_ms, "Job finished");
        } else {
            warn!(
                job_id = %outcome.job_id,
                status = %outcome.status,
                duration_ms,
                "Job did not complete"
            );
        }
    }
}
