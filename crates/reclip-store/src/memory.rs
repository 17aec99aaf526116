//! In-process job store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reclip_models::{Job, JobId, JobUpdate, NewJob};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::repo::JobRepository;

/// Jobs kept in a map keyed by external id.
///
/// The write lock is held for the whole read-check-write of a mutation, which
/// makes every update atomic per row.
#[derive(Debug, Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<JobId, Job>>,
    next_id: AtomicI64,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a job as-is (fixtures, imports).
    pub async fn insert(&self, job: Job) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.external_id) {
            return Err(StoreError::AlreadyExists(job.external_id.to_string()));
        }
        self.next_id.fetch_max(job.id, Ordering::SeqCst);
        jobs.insert(job.external_id.clone(), job);
        Ok(())
    }

    async fn mutate<F>(&self, id: &JobId, f: F) -> StoreResult<bool>
    where
        F: FnOnce(&mut Job) -> bool + Send,
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(id.as_str()))?;
        Ok(f(job))
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create(&self, new_job: NewJob) -> StoreResult<Job> {
        let mut jobs = self.jobs.write().await;
        let mut external_id = JobId::new();
        while jobs.contains_key(&external_id) {
            external_id = JobId::new();
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let job = Job::new(id, external_id.clone(), new_job);
        jobs.insert(external_id, job.clone());
        debug!(job_id = %job.external_id, "Created job");
        Ok(job)
    }

    async fn find_by_external_id(&self, id: &JobId) -> StoreResult<Option<Job>> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn find_by_external_id_and_user(
        &self,
        id: &JobId,
        user_id: &str,
    ) -> StoreResult<Option<Job>> {
        Ok(self
            .jobs
            .read()
            .await
            .get(id)
            .filter(|job| job.user_id == user_id)
            .cloned())
    }

    async fn find_by_user(&self, user_id: &str) -> StoreResult<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| job.user_id == user_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(jobs)
    }

    async fn apply_update(&self, id: &JobId, update: JobUpdate) -> StoreResult<bool> {
        let written = self.mutate(id, |job| job.apply_update(update)).await?;
        if written {
            debug!(job_id = %id, status = %update.status, progress = update.progress, "Job updated");
        }
        Ok(written)
    }

    async fn complete(&self, id: &JobId, file_path: &str) -> StoreResult<bool> {
        let path = file_path.to_string();
        self.mutate(id, move |job| job.complete(path)).await
    }

    async fn find_completed_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Job>> {
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| job.created_at < cutoff && job.downloadable_path().is_some())
            .cloned()
            .collect())
    }

    async fn clear_file_path(&self, id: &JobId) -> StoreResult<bool> {
        self.mutate(id, Job::expire).await
    }
}
