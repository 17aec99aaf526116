//! Ordered application of job updates.
//!
//! Progress callbacks fire from inside the tool wrappers, possibly faster than
//! storage can absorb them. Every observation for one job goes through a
//! single FIFO channel drained by one task, so the store sees updates in the
//! order they were produced.

use reclip_models::{JobId, JobStatus, JobUpdate};
use reclip_store::DynJobRepository;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

enum TrackerMsg {
    Update(JobUpdate),
    Flush(oneshot::Sender<()>),
}

/// Per-job update funnel.
pub struct JobTracker {
    tx: mpsc::UnboundedSender<TrackerMsg>,
    handle: JoinHandle<()>,
}

impl JobTracker {
    /// Start the consumer task for `id`.
    pub fn spawn(repo: DynJobRepository, id: JobId) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                match msg {
                    TrackerMsg::Update(update) => match repo.apply_update(&id, update).await {
                        Ok(true) => {}
                        Ok(false) => debug!(job_id = %id, ?update, "Update absorbed"),
                        Err(e) => warn!(job_id = %id, "Failed to persist job update: {}", e),
                    },
                    TrackerMsg::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });

        Self { tx, handle }
    }

    /// Queue an observation.
    pub fn update(&self, update: JobUpdate) {
        let _ = self.tx.send(TrackerMsg::Update(update));
    }

    /// Progress callback for the given phase.
    pub fn reporter(&self, status: JobStatus) -> impl Fn(u8) + Send + Sync + 'static {
        let tx = self.tx.clone();
        move |progress| {
            let _ = tx.send(TrackerMsg::Update(JobUpdate::progress(status, progress)));
        }
    }

    /// Wait until everything queued so far has been applied.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(TrackerMsg::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Queue a phase transition behind all pending ticks and wait for it.
    pub async fn transition(&self, status: JobStatus) {
        self.update(JobUpdate::status(status));
        self.flush().await;
    }

    /// Drain the queue and stop the consumer. Ticks sent afterwards by a
    /// lingering reporter are dropped.
    pub async fn finish(self) {
        self.flush().await;
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reclip_models::NewJob;
    use reclip_store::{InMemoryJobRepository, JobRepository};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_updates_applied_in_order() {
        let repo = Arc::new(InMemoryJobRepository::new());
        let job = repo.create(NewJob::new("u1", "https://a")).await.unwrap();
        let tracker = JobTracker::spawn(repo.clone(), job.external_id.clone());

        tracker.transition(JobStatus::Downloading).await;
        let report = tracker.reporter(JobStatus::Downloading);
        for p in [1, 2, 3, 50, 75, 100] {
            report(p);
        }
        tracker.transition(JobStatus::Processing).await;

        let stored = repo.find_by_external_id(&job.external_id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Processing);
        assert_eq!(stored.progress, 0);

        // A tick from the finished phase arriving late is absorbed.
        report(100);
        tracker.flush().await;
        let stored = repo.find_by_external_id(&job.external_id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Processing);
        assert_eq!(stored.progress, 0);

        tracker.finish().await;
    }

    #[tokio::test]
    async fn test_finish_drains_pending_updates() {
        let repo = Arc::new(InMemoryJobRepository::new());
        let job = repo.create(NewJob::new("u1", "https://a")).await.unwrap();
        let tracker = JobTracker::spawn(repo.clone(), job.external_id.clone());

        tracker.update(JobUpdate::status(JobStatus::Downloading));
        tracker.update(JobUpdate::progress(JobStatus::Downloading, 42));
        tracker.finish().await;

        let stored = repo.find_by_external_id(&job.external_id).await.unwrap().unwrap();
        assert_eq!(stored.progress, 42);
    }
}
