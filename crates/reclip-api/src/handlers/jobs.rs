//! Job submission, status, listing and artifact download.

use std::io::ErrorKind;
use std::path::Path as FsPath;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::Response;
use axum::Json;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};
use validator::Validate;

use reclip_models::{Job, JobId, JobRequest, JobStatus, JobUpdate, NewJob};
use reclip_worker::SubmitError;

use crate::auth::OwnerId;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Create a job and hand it to the executor. Returns the external id as
/// plain text.
///
/// Shape errors (URL length, resolution or container syntax) are rejected
/// here; mode and trim errors are left to the pipeline, which records them
/// on the job as `FAILED`.
pub async fn start_job(
    State(state): State<AppState>,
    owner: OwnerId,
    Json(request): Json<JobRequest>,
) -> ApiResult<String> {
    request.validate()?;

    let job = state
        .jobs
        .create(NewJob::new(owner.as_str(), request.url.clone()))
        .await?;
    let job_id = job.external_id;
    info!(job_id = %job_id, user_id = %owner.as_str(), "Job created");

    match state.executor.submit(job_id.clone(), request) {
        Ok(()) => Ok(job_id.to_string()),
        Err(e) => {
            warn!(job_id = %job_id, "Job not accepted: {}", e);
            state
                .jobs
                .apply_update(&job_id, JobUpdate::status(JobStatus::Failed))
                .await?;
            Err(match e {
                SubmitError::Saturated => ApiError::unavailable(e.to_string()),
                SubmitError::Closed => ApiError::shutting_down(e.to_string()),
            })
        }
    }
}

/// The caller's jobs, newest first.
pub async fn list_jobs(State(state): State<AppState>, owner: OwnerId) -> ApiResult<Json<Vec<Job>>> {
    let jobs = state.jobs.find_by_user(owner.as_str()).await?;
    Ok(Json(jobs))
}

/// Status of one of the caller's jobs.
pub async fn job_status(
    State(state): State<AppState>,
    owner: OwnerId,
    Path(external_id): Path<String>,
) -> ApiResult<Json<Job>> {
    let job_id = parse_job_id(&external_id)?;
    let job = state
        .jobs
        .find_by_external_id_and_user(&job_id, owner.as_str())
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;
    Ok(Json(job))
}

/// Stream a completed job's artifact.
///
/// Scoped to the owner unless public download links are enabled, in which
/// case the external id alone grants access.
pub async fn download_job(
    State(state): State<AppState>,
    owner: Option<OwnerId>,
    Path(external_id): Path<String>,
) -> ApiResult<Response> {
    let job_id = parse_job_id(&external_id)?;

    let job = if state.config.public_download_links {
        state.jobs.find_by_external_id(&job_id).await?
    } else {
        let owner = owner.ok_or_else(|| ApiError::unauthorized("Missing X-User-Id header"))?;
        state
            .jobs
            .find_by_external_id_and_user(&job_id, owner.as_str())
            .await?
    };

    let job = job.ok_or_else(|| ApiError::not_found("Job not found"))?;
    let path = job
        .downloadable_path()
        .ok_or_else(|| ApiError::not_found("No file available for this job"))?;

    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(job_id = %job_id, path, "Completed job references a missing file");
            return Err(ApiError::not_found("No file available for this job"));
        }
        Err(e) => return Err(e.into()),
    };
    let size = file.metadata().await?.len();

    let filename = FsPath::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| job_id.to_string());

    Response::builder()
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, size)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::internal(e.to_string()))
}

fn parse_job_id(raw: &str) -> ApiResult<JobId> {
    JobId::parse(raw).ok_or_else(|| ApiError::not_found("Job not found"))
}
