//! Background job processing: one pipeline per job, bounded by an executor.

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod tracker;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::{JobExecutor, JobOutcome, SubmitError};
pub use pipeline::JobPipeline;
pub use tracker::JobTracker;
