//! Application state.

use std::sync::Arc;

use reclip_media::{FormatDiscovery, YtDlp};
use reclip_store::DynJobRepository;
use reclip_worker::{JobExecutor, JobPipeline, WorkerConfig};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub jobs: DynJobRepository,
    pub executor: Arc<JobExecutor>,
    pub discovery: Arc<FormatDiscovery>,
}

impl AppState {
    /// Wire the repository, pipeline and executor together.
    pub fn new(config: ApiConfig, worker: &WorkerConfig, jobs: DynJobRepository) -> Self {
        let pipeline = JobPipeline::new(worker, Arc::clone(&jobs));
        let executor = JobExecutor::new(worker, pipeline);
        let discovery = FormatDiscovery::new(YtDlp::new(worker.tools.clone()));

        Self {
            config,
            jobs,
            executor: Arc::new(executor),
            discovery: Arc::new(discovery),
        }
    }
}
