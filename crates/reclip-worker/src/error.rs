//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] reclip_models::RequestError),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Pipeline panicked: {0}")]
    Panicked(String),

    #[error("Store error: {0}")]
    Store(#[from] reclip_store::StoreError),

    #[error("Media error: {0}")]
    Media(#[from] reclip_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::JobNotFound(_) => "not_found",
            WorkerError::InvalidRequest(_) => "validation",
            WorkerError::DownloadFailed(_) => "download",
            WorkerError::Panicked(_) => "panic",
            WorkerError::Store(_) => "store",
            WorkerError::Media(reclip_media::MediaError::FfmpegFailed { .. }) => "transcode",
            WorkerError::Media(_) => "media",
            WorkerError::Io(_) => "io",
        }
    }
}
