//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use reclip_media::ToolsConfig;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum pipelines running at once
    pub max_concurrent_jobs: usize,
    /// Accepted jobs allowed to wait for a free slot
    pub queue_capacity: usize,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Scratch directory for downloaded streams
    pub temp_dir: PathBuf,
    /// Directory for finished artifacts
    pub output_dir: PathBuf,
    /// External tool settings
    pub tools: ToolsConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            queue_capacity: 16,
            shutdown_timeout: Duration::from_secs(30),
            temp_dir: PathBuf::from("/tmp/reclip/tmp"),
            output_dir: PathBuf::from("/tmp/reclip/output"),
            tools: ToolsConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            queue_capacity: std::env::var("WORKER_QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.queue_capacity),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            temp_dir: std::env::var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_dir),
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            tools: ToolsConfig::from_env(),
        }
    }

    /// Total jobs the executor holds (running plus waiting).
    pub fn admission_capacity(&self) -> usize {
        self.max_concurrent_jobs + self.queue_capacity
    }
}
