//! Per-job pipeline: select, download, transcode, complete.

use std::any::Any;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use reclip_media::{build_format_selector, TranscodeSpec, Transcoder, YtDlp, AUDIO_SELECTOR};
use reclip_models::{Job, JobId, JobRequest, JobStatus, JobUpdate};
use reclip_store::DynJobRepository;
use tempfile::TempDir;
use tracing::{error, warn, Instrument};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::tracker::JobTracker;

/// State shared by the phases of one run.
struct RunContext<'a> {
    id: &'a JobId,
    tracker: &'a JobTracker,
    logger: &'a JobLogger,
}

/// Per-job scratch directory, `<parent>/<id>_XXXXXX`. Removed with its
/// contents (partial downloads included) when dropped.
fn scratch_dir(parent: &Path, id: &JobId) -> io::Result<TempDir> {
    tempfile::Builder::new()
        .prefix(&format!("{}_", id))
        .tempdir_in(parent)
}

/// Drives one job from `QUEUED` to a terminal state.
pub struct JobPipeline {
    repo: DynJobRepository,
    ytdlp: YtDlp,
    transcoder: Transcoder,
    temp_dir: PathBuf,
    output_dir: PathBuf,
}

impl JobPipeline {
    pub fn new(config: &WorkerConfig, repo: DynJobRepository) -> Self {
        Self {
            repo,
            ytdlp: YtDlp::new(config.tools.clone()),
            transcoder: Transcoder::new(config.tools.clone()),
            temp_dir: config.temp_dir.clone(),
            output_dir: config.output_dir.clone(),
        }
    }

    /// Run the pipeline in its own task and turn any escape (error or panic)
    /// into a `FAILED` job. Returns the final status.
    pub async fn run_guarded(self: Arc<Self>, id: JobId, request: JobRequest) -> JobStatus {
        let pipeline = Arc::clone(&self);
        let task_id = id.clone();
        let handle = tokio::spawn(async move { pipeline.process(&task_id, &request).await });

        match handle.await {
            Ok(Ok(status)) => status,
            Ok(Err(WorkerError::JobNotFound(_))) => {
                warn!(job_id = %id, "Job not found, nothing to process");
                JobStatus::Failed
            }
            Ok(Err(e)) => {
                error!(job_id = %id, "Job pipeline aborted: {}", e);
                metrics::record_job_failed(e.kind());
                self.mark_failed(&id).await
            }
            Err(join_err) => {
                let message = if join_err.is_panic() {
                    panic_message(join_err.into_panic())
                } else {
                    join_err.to_string()
                };
                error!(job_id = %id, "{}", WorkerError::Panicked(message));
                metrics::record_job_failed("panic");
                self.mark_failed(&id).await
            }
        }
    }

    /// Process one job. Failures inside the pipeline are recorded on the job
    /// and reported as `Ok(JobStatus::Failed)`; `Err` means the job could not
    /// be loaded or its final state could not be written.
    pub async fn process(&self, id: &JobId, request: &JobRequest) -> WorkerResult<JobStatus> {
        let job = self
            .repo
            .find_by_external_id(id)
            .await?
            .ok_or_else(|| WorkerError::JobNotFound(id.to_string()))?;

        let operation = request.mode().map(|m| m.as_str()).unwrap_or("invalid");
        let logger = JobLogger::new(id, operation);
        let span = logger.create_span();

        self.process_job(job, request, &logger).instrument(span).await
    }

    async fn process_job(
        &self,
        job: Job,
        request: &JobRequest,
        logger: &JobLogger,
    ) -> WorkerResult<JobStatus> {
        logger.log_start(&job.original_url);

        let tracker = JobTracker::spawn(Arc::clone(&self.repo), job.external_id.clone());
        let ctx = RunContext {
            id: &job.external_id,
            tracker: &tracker,
            logger,
        };

        let outcome = self.execute(&ctx, request).await;

        let status = match outcome {
            Ok(output) => {
                tracker.flush().await;
                let path = output.to_string_lossy().to_string();
                if self.repo.complete(&job.external_id, &path).await? {
                    logger.log_completion(&path);
                    JobStatus::Completed
                } else {
                    logger.log_warning("job left PROCESSING before it could be completed");
                    self.current_status(&job.external_id).await
                }
            }
            Err(e) => {
                logger.log_error(&e.to_string());
                metrics::record_job_failed(e.kind());
                tracker.transition(JobStatus::Failed).await;
                JobStatus::Failed
            }
        };

        tracker.finish().await;
        Ok(status)
    }

    /// Runs the download and transcode phases. The scratch directory lives
    /// for the duration of this call only.
    async fn execute(&self, ctx: &RunContext<'_>, request: &JobRequest) -> WorkerResult<PathBuf> {
        let mode = request.check()?;
        let trim = request.trim()?;

        ctx.tracker.transition(JobStatus::Downloading).await;
        tokio::fs::create_dir_all(&self.temp_dir).await?;
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let scratch = scratch_dir(&self.temp_dir, ctx.id)?;

        let video = if mode.needs_video() {
            let selector =
                build_format_selector(request.format_id.as_deref(), request.target_resolution());
            Some(
                self.acquire(ctx, scratch.path(), "video", &selector, &request.url)
                    .await?,
            )
        } else {
            None
        };

        let audio = if mode.needs_audio() {
            Some(
                self.acquire(ctx, scratch.path(), "audio", AUDIO_SELECTOR, &request.url)
                    .await?,
            )
        } else {
            None
        };

        ctx.tracker.transition(JobStatus::Processing).await;

        let output = self
            .output_dir
            .join(format!("{}.{}", ctx.id, request.output_container(mode)));
        let spec = TranscodeSpec {
            mode,
            video,
            audio,
            output: output.clone(),
            trim,
            resolution: None,
        }
        .with_resolution(request.target_resolution().map(str::to_string));

        ctx.logger.log_progress(&format!("transcoding into {}", output.display()));
        let started = Instant::now();
        let result = self
            .transcoder
            .run(&spec, ctx.tracker.reporter(JobStatus::Processing))
            .await;
        metrics::record_ffmpeg_duration(mode.as_str(), started.elapsed().as_secs_f64());

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&output).await;
            return Err(e.into());
        }

        Ok(output)
    }

    async fn acquire(
        &self,
        ctx: &RunContext<'_>,
        scratch: &Path,
        stream: &str,
        selector: &str,
        url: &str,
    ) -> WorkerResult<PathBuf> {
        let template = scratch.join(format!("{}_{}.%(ext)s", ctx.id, stream));
        ctx.logger
            .log_progress(&format!("downloading {} stream ({})", stream, selector));

        let started = Instant::now();
        let path = self
            .ytdlp
            .acquire(
                selector,
                &template.to_string_lossy(),
                url,
                ctx.tracker.reporter(JobStatus::Downloading),
            )
            .await?;
        metrics::record_download_duration(stream, started.elapsed().as_secs_f64());

        path.ok_or_else(|| WorkerError::download_failed(format!("{} download failed", stream)))
    }

    async fn mark_failed(&self, id: &JobId) -> JobStatus {
        if let Err(e) = self.repo.apply_update(id, JobUpdate::status(JobStatus::Failed)).await {
            error!(job_id = %id, "Failed to mark job as failed: {}", e);
        }
        self.current_status(id).await
    }

    async fn current_status(&self, id: &JobId) -> JobStatus {
        match self.repo.find_by_external_id(id).await {
            Ok(Some(job)) => job.status,
            _ => JobStatus::Failed,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
