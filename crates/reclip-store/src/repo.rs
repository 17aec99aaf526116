//! Repository trait.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reclip_models::{Job, JobId, JobUpdate, NewJob};

use crate::error::StoreResult;

/// Shared handle to a repository implementation.
pub type DynJobRepository = Arc<dyn JobRepository>;

/// Read and write operations on job records.
///
/// Implementations must apply each mutation atomically for a single job and
/// evaluate the transition rule against the stored state, not a caller copy.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Create a `QUEUED` job with a fresh external id.
    async fn create(&self, new_job: NewJob) -> StoreResult<Job>;

    async fn find_by_external_id(&self, id: &JobId) -> StoreResult<Option<Job>>;

    /// Lookup restricted to the owner; another user's job reads as missing.
    async fn find_by_external_id_and_user(&self, id: &JobId, user_id: &str)
        -> StoreResult<Option<Job>>;

    /// Jobs owned by `user_id`, newest first.
    async fn find_by_user(&self, user_id: &str) -> StoreResult<Vec<Job>>;

    /// Apply a status/progress observation. Returns whether anything was
    /// written; absorbed updates are not errors.
    async fn apply_update(&self, id: &JobId, update: JobUpdate) -> StoreResult<bool>;

    /// Move a `PROCESSING` job to `COMPLETED` with its artifact path.
    async fn complete(&self, id: &JobId, file_path: &str) -> StoreResult<bool>;

    /// Completed jobs created before `cutoff` that still reference a file.
    async fn find_completed_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Job>>;

    /// Mark a completed job's artifact as purged.
    async fn clear_file_path(&self, id: &JobId) -> StoreResult<bool>;
}
