//! Job record and its status machine.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Externally visible job identifier (UUID v4).
///
/// The numeric storage key of a [`Job`] is never exposed; every client-facing
/// operation addresses jobs through this handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Parse a client-supplied identifier, rejecting anything that is not a UUID.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(|u| Self(u.to_string()))
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Job lifecycle status.
///
/// `QUEUED → DOWNLOADING → PROCESSING → COMPLETED`, with `FAILED` reachable
/// from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Accepted, waiting for the pipeline
    #[default]
    Queued,
    /// Downloader phase
    Downloading,
    /// Transcoder phase
    Processing,
    /// Artifact available
    Completed,
    /// Terminal failure
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Downloading => "DOWNLOADING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Phases carry a progress counter.
    pub fn is_phase(&self) -> bool {
        matches!(self, JobStatus::Downloading | JobStatus::Processing)
    }

    /// Whether the machine has an edge from `self` to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Queued, Downloading)
                | (Downloading, Processing)
                | (Processing, Completed)
                | (Queued | Downloading | Processing, Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A status/progress observation produced by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobUpdate {
    pub status: JobStatus,
    pub progress: u8,
}

impl JobUpdate {
    /// A phase transition (progress implicitly restarts at 0).
    pub fn status(status: JobStatus) -> Self {
        Self { status, progress: 0 }
    }

    /// A progress tick within `status`.
    pub fn progress(status: JobStatus, progress: u8) -> Self {
        Self {
            status,
            progress: progress.min(100),
        }
    }
}

/// Data needed to create a job record.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub user_id: String,
    pub original_url: String,
}

impl NewJob {
    pub fn new(user_id: impl Into<String>, original_url: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            original_url: original_url.into(),
        }
    }
}

/// Persisted unit of work.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Internal storage key
    #[serde(skip_serializing, default)]
    pub id: i64,

    /// Client-facing identifier
    pub external_id: JobId,

    /// Submitting principal
    pub user_id: String,

    /// Current status
    pub status: JobStatus,

    /// Progress within the current phase (0-100)
    pub progress: u8,

    /// Source URL
    pub original_url: String,

    /// Final artifact; empty once reaped by retention
    pub file_path: Option<String>,

    /// Creation timestamp, also the retention clock
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Build a fresh `QUEUED` job.
    pub fn new(id: i64, external_id: JobId, new_job: NewJob) -> Self {
        Self {
            id,
            external_id,
            user_id: new_job.user_id,
            status: JobStatus::Queued,
            progress: 0,
            original_url: new_job.original_url,
            file_path: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply an observation using the write-throttling rule.
    ///
    /// Returns `true` when the record changed and must be persisted:
    /// - same status: only if the progress strictly increases inside a phase;
    /// - different status: only along a forward edge of the machine, with the
    ///   progress reset to 0.
    ///
    /// `COMPLETED` is never entered here; see [`Job::complete`].
    pub fn apply_update(&mut self, update: JobUpdate) -> bool {
        if update.status == self.status {
            if !self.status.is_phase() || update.progress <= self.progress {
                return false;
            }
            self.progress = update.progress.min(100);
            return true;
        }

        if update.status == JobStatus::Completed || !self.status.can_transition_to(update.status) {
            return false;
        }

        self.status = update.status;
        self.progress = 0;
        true
    }

    /// Finish the job with its artifact. Only valid from `PROCESSING`.
    pub fn complete(&mut self, file_path: impl Into<String>) -> bool {
        if !self.status.can_transition_to(JobStatus::Completed) {
            return false;
        }
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.file_path = Some(file_path.into());
        true
    }

    /// Clear the artifact reference after retention deleted the file.
    pub fn expire(&mut self) -> bool {
        match (&self.status, self.file_path.as_deref()) {
            (JobStatus::Completed, Some(path)) if !path.is_empty() => {
                self.file_path = Some(String::new());
                true
            }
            _ => false,
        }
    }

    /// Completed, but the artifact has been purged.
    pub fn is_expired(&self) -> bool {
        self.status == JobStatus::Completed
            && self.file_path.as_deref().map_or(true, str::is_empty)
    }

    /// Path of a downloadable artifact, if any.
    pub fn downloadable_path(&self) -> Option<&str> {
        match (&self.status, self.file_path.as_deref()) {
            (JobStatus::Completed, Some(path)) if !path.is_empty() => Some(path),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn queued() -> Job {
        Job::new(1, JobId::new(), NewJob::new("user-1", "https://example.com/v"))
    }

    #[test]
    fn test_job_creation() {
        let job = queued();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0);
        assert!(job.file_path.is_none());
        assert!(!job.is_terminal());
    }

    #[test]
    fn test_internal_id_not_serialized() {
        let job = queued();
        let json = serde_json::to_value(&job).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["status"], "QUEUED");
        assert_eq!(json["externalId"], job.external_id.as_str());
    }

    #[test]
    fn test_job_id_parse() {
        assert!(JobId::parse("not-a-uuid").is_none());
        let id = JobId::new();
        assert_eq!(JobId::parse(id.as_str()), Some(id));
    }

    #[test]
    fn test_full_lifecycle() {
        let mut job = queued();
        assert!(job.apply_update(JobUpdate::status(JobStatus::Downloading)));
        assert!(job.apply_update(JobUpdate::progress(JobStatus::Downloading, 40)));
        assert!(job.apply_update(JobUpdate::status(JobStatus::Processing)));
        assert_eq!(job.progress, 0);
        assert!(job.apply_update(JobUpdate::progress(JobStatus::Processing, 12)));
        assert!(job.complete("/out/a.mp4"));
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.downloadable_path(), Some("/out/a.mp4"));
    }

    #[test]
    fn test_progress_never_regresses() {
        let mut job = queued();
        job.apply_update(JobUpdate::status(JobStatus::Downloading));

        let observations = [5, 3, 5, 17, 9, 17, 60, 59, 100, 2];
        let mut last = 0;
        for p in observations {
            job.apply_update(JobUpdate::progress(JobStatus::Downloading, p));
            assert!(job.progress >= last);
            last = job.progress;
        }
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn test_duplicate_progress_is_absorbed() {
        let mut job = queued();
        job.apply_update(JobUpdate::status(JobStatus::Downloading));
        assert!(job.apply_update(JobUpdate::progress(JobStatus::Downloading, 10)));
        assert!(!job.apply_update(JobUpdate::progress(JobStatus::Downloading, 10)));
    }

    #[test]
    fn test_late_tick_from_previous_phase_is_absorbed() {
        let mut job = queued();
        job.apply_update(JobUpdate::status(JobStatus::Downloading));
        job.apply_update(JobUpdate::status(JobStatus::Processing));

        assert!(!job.apply_update(JobUpdate::progress(JobStatus::Downloading, 90)));
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.progress, 0);
    }

    #[test]
    fn test_status_change_persisted_even_with_lower_progress() {
        let mut job = queued();
        job.apply_update(JobUpdate::status(JobStatus::Downloading));
        job.apply_update(JobUpdate::progress(JobStatus::Downloading, 80));
        assert!(job.apply_update(JobUpdate::status(JobStatus::Failed)));
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[test]
    fn test_terminal_states_reject_updates() {
        let mut job = queued();
        job.apply_update(JobUpdate::status(JobStatus::Failed));
        assert!(!job.apply_update(JobUpdate::status(JobStatus::Downloading)));
        assert!(!job.apply_update(JobUpdate::status(JobStatus::Failed)));
        assert!(!job.complete("/out/x.mp4"));
        assert!(job.file_path.is_none());
    }

    #[test]
    fn test_queued_cannot_skip_to_processing() {
        let mut job = queued();
        assert!(!job.apply_update(JobUpdate::status(JobStatus::Processing)));
        assert!(!job.apply_update(JobUpdate::status(JobStatus::Completed)));
        assert!(!job.complete("/out/x.mp4"));
        assert_eq!(job.status, JobStatus::Queued);
    }

    #[test]
    fn test_expire() {
        let mut job = queued();
        job.apply_update(JobUpdate::status(JobStatus::Downloading));
        job.apply_update(JobUpdate::status(JobStatus::Processing));
        job.complete("/out/a.mp3");
        assert!(!job.is_expired());

        assert!(job.expire());
        assert_eq!(job.file_path.as_deref(), Some(""));
        assert!(job.is_expired());
        assert!(job.downloadable_path().is_none());
        assert!(!job.expire());
    }

    fn any_status() -> impl Strategy<Value = JobStatus> {
        prop::sample::select(vec![
            JobStatus::Queued,
            JobStatus::Downloading,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ])
    }

    fn stage(status: JobStatus) -> u8 {
        match status {
            JobStatus::Queued => 0,
            JobStatus::Downloading => 1,
            JobStatus::Processing => 2,
            JobStatus::Completed | JobStatus::Failed => 3,
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// *For any* sequence of observations, stored progress never drops
        /// within a phase, the status never moves backwards, and every
        /// observation along a forward edge is persisted.
        #[test]
        fn prop_apply_update_never_regresses(
            updates in prop::collection::vec((any_status(), 0u8..=100), 1..60),
        ) {
            let mut job = queued();

            for (status, progress) in updates {
                let before = (job.status, job.progress);
                let wrote = job.apply_update(JobUpdate::progress(status, progress));

                prop_assert!(stage(job.status) >= stage(before.0));
                if job.status == before.0 {
                    prop_assert!(job.progress >= before.1);
                }

                let forward = status != before.0
                    && status != JobStatus::Completed
                    && before.0.can_transition_to(status);
                if forward {
                    prop_assert!(wrote);
                    prop_assert_eq!(job.status, status);
                    prop_assert_eq!(job.progress, 0);
                }

                if !wrote {
                    prop_assert_eq!((job.status, job.progress), before);
                }
                prop_assert!(job.file_path.is_none());
            }
        }

        /// Ticks inside one phase persist exactly the running maximum.
        #[test]
        fn prop_phase_progress_is_running_max(ticks in prop::collection::vec(0u8..=100, 1..80)) {
            let mut job = queued();
            job.apply_update(JobUpdate::status(JobStatus::Downloading));

            let mut max = 0;
            for p in ticks {
                let wrote = job.apply_update(JobUpdate::progress(JobStatus::Downloading, p));
                prop_assert_eq!(wrote, p > max);
                max = max.max(p);
                prop_assert_eq!(job.progress, max);
            }
        }
    }
}
