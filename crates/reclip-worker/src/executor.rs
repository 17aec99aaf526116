//! Job executor.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use reclip_models::{JobId, JobRequest, JobStatus};
use thiserror::Error;
use tokio::sync::{mpsc, watch, Semaphore};
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::metrics;
use crate::pipeline::JobPipeline;

/// Why a job was not accepted.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Executor is at capacity")]
    Saturated,

    #[error("Executor is shutting down")]
    Closed,
}

/// Final report for one submitted job.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub status: JobStatus,
    pub duration: Duration,
}

/// Bounded pool running job pipelines in the background.
///
/// Admission is bounded by `max_concurrent_jobs + queue_capacity`; a job
/// holds its admission permit until its pipeline finishes, and at most
/// `max_concurrent_jobs` pipelines run at once.
pub struct JobExecutor {
    pipeline: Arc<JobPipeline>,
    admission: Arc<Semaphore>,
    running: Arc<Semaphore>,
    capacity: usize,
    max_concurrent_jobs: usize,
    shutdown: watch::Sender<bool>,
    shutdown_timeout: Duration,
    outcome_tx: mpsc::UnboundedSender<JobOutcome>,
    outcome_rx: Mutex<Option<mpsc::UnboundedReceiver<JobOutcome>>>,
}

impl JobExecutor {
    /// Create a new job executor.
    pub fn new(config: &WorkerConfig, pipeline: JobPipeline) -> Self {
        let capacity = config.admission_capacity();
        let (shutdown, _) = watch::channel(false);
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        info!(
            "Starting job executor with {} max concurrent jobs and {} queued",
            config.max_concurrent_jobs, config.queue_capacity
        );

        Self {
            pipeline: Arc::new(pipeline),
            admission: Arc::new(Semaphore::new(capacity)),
            running: Arc::new(Semaphore::new(config.max_concurrent_jobs)),
            capacity,
            max_concurrent_jobs: config.max_concurrent_jobs,
            shutdown,
            shutdown_timeout: config.shutdown_timeout,
            outcome_tx,
            outcome_rx: Mutex::new(Some(outcome_rx)),
        }
    }

    /// Accept a job for background processing. Never blocks: returns
    /// `Saturated` when every admission slot is taken.
    pub fn submit(&self, job_id: JobId, request: JobRequest) -> Result<(), SubmitError> {
        if *self.shutdown.borrow() {
            return Err(SubmitError::Closed);
        }

        let admission = match Arc::clone(&self.admission).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                metrics::record_job_rejected();
                warn!(job_id = %job_id, "Rejecting job, executor saturated");
                return Err(SubmitError::Saturated);
            }
        };

        metrics::record_job_submitted(request.mode().map(|m| m.as_str()).unwrap_or("invalid"));
        debug!(job_id = %job_id, "Job accepted");

        let pipeline = Arc::clone(&self.pipeline);
        let running = Arc::clone(&self.running);
        let outcome_tx = self.outcome_tx.clone();
        let max = self.max_concurrent_jobs;

        tokio::spawn(async move {
            let _admission = admission;
            let permit = match running.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            metrics::set_jobs_in_flight(max - running.available_permits());

            let started = Instant::now();
            let status = pipeline.run_guarded(job_id.clone(), request).await;
            let duration = started.elapsed();

            drop(permit);
            metrics::set_jobs_in_flight(max - running.available_permits());
            if status == JobStatus::Completed {
                metrics::record_job_completed(duration.as_secs_f64());
            }

            let _ = outcome_tx.send(JobOutcome {
                job_id,
                status,
                duration,
            });
        });

        Ok(())
    }

    /// Take the outcome stream. Only the first caller gets it.
    pub fn outcomes(&self) -> Option<mpsc::UnboundedReceiver<JobOutcome>> {
        self.outcome_rx.lock().ok()?.take()
    }

    /// Jobs accepted and not yet finished, running or waiting.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.admission.available_permits()
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Stop accepting jobs and wait for accepted ones to finish, up to the
    /// shutdown timeout. Returns `true` when everything drained.
    pub async fn shutdown(&self) -> bool {
        let _ = self.shutdown.send(true);

        info!("Waiting for in-flight jobs to complete...");
        let drained = tokio::time::timeout(self.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_ok();

        if drained {
            info!("Job executor stopped");
        } else {
            warn!(
                in_flight = self.in_flight(),
                "Shutdown timeout reached with jobs still running"
            );
        }
        drained
    }

    /// Wait for all in-flight jobs to complete.
    async fn wait_for_jobs(&self) {
        loop {
            if self.admission.available_permits() == self.capacity {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
