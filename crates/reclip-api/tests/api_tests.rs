//! HTTP tests driving the router with `tower::ServiceExt::oneshot`.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;

use reclip_api::{create_router, ApiConfig, AppState, RetentionConfig, RetentionSweeper};
use reclip_media::ToolsConfig;
use reclip_models::{Job, JobId, JobStatus, NewJob};
use reclip_store::{InMemoryJobRepository, JobRepository};
use reclip_worker::{JobExecutor, WorkerConfig};

const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

const FAKE_YTDLP: &str = r#"if [ "$1" = "-F" ]; then
  echo "137 mp4 1920x1080 30 | 30MiB | avc1.640028 video only 1080p"
  echo "248 webm 1920x1080 30 | 28MiB | vp9 video only 1080p"
  echo "136 mp4 1280x720 30 | 12MiB | avc1.4d401f video only 720p"
  exit 0
fi
sleep "${FAKE_DELAY:-0}"
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; shift; fi
  shift
done
path=$(printf '%s' "$out" | sed 's/%(ext)s/webm/')
echo "[download] Destination: $path"
echo "[download]  50.0% of 1.00MiB"
echo data > "$path""#;

const FAKE_FFMPEG: &str = r#"for a in "$@"; do out="$a"; done
echo "  Duration: 00:00:10.00, start: 0.000000" 1>&2
echo "size=1kB time=00:00:05.00 bitrate=1k" 1>&2
printf 'clip-bytes' > "$out""#;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

struct TestApp {
    _root: tempfile::TempDir,
    router: Router,
    jobs: Arc<InMemoryJobRepository>,
    executor: Arc<JobExecutor>,
}

fn build_app(config: ApiConfig, delay_secs: u32, max_jobs: usize, queue: usize) -> TestApp {
    let root = tempfile::tempdir().unwrap();
    let ytdlp = write_script(
        root.path(),
        "yt-dlp",
        &FAKE_YTDLP.replace("${FAKE_DELAY:-0}", &delay_secs.to_string()),
    );
    let ffmpeg = write_script(root.path(), "ffmpeg", FAKE_FFMPEG);

    let worker = WorkerConfig {
        max_concurrent_jobs: max_jobs,
        queue_capacity: queue,
        temp_dir: root.path().join("tmp"),
        output_dir: root.path().join("out"),
        tools: ToolsConfig::default().with_binaries(ytdlp, ffmpeg),
        ..WorkerConfig::default()
    };

    let jobs = Arc::new(InMemoryJobRepository::new());
    let state = AppState::new(config, &worker, jobs.clone());
    let executor = state.executor.clone();

    TestApp {
        _root: root,
        router: create_router(state, None),
        jobs,
        executor,
    }
}

fn test_app() -> TestApp {
    build_app(ApiConfig::default(), 0, 2, 4)
}

async fn send(app: &TestApp, request: Request<Body>) -> Response {
    app.router.clone().oneshot(request).await.unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn get(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(user) = user {
        builder = builder.header("X-User-Id", user);
    }
    builder.body(Body::empty()).unwrap()
}

fn start_job(user: Option<&str>, payload: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/jobs/start-job")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(user) = user {
        builder = builder.header("X-User-Id", user);
    }
    builder.body(Body::from(payload.to_string())).unwrap()
}

async fn submit(app: &TestApp, user: &str, payload: Value) -> JobId {
    let response = send(app, start_job(Some(user), payload)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let id = String::from_utf8(body_bytes(response).await).unwrap();
    JobId::parse(&id).expect("start-job returns a UUID")
}

async fn wait_for_terminal(app: &TestApp, id: &JobId) -> Job {
    for _ in 0..100 {
        let job = app.jobs.find_by_external_id(id).await.unwrap().unwrap();
        if job.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("job {} did not finish", id);
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let response = send(&app, get("/health", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["X-Content-Type-Options"], "nosniff");
    assert!(response.headers().contains_key("X-Request-ID"));
    assert_eq!(body_json(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_start_job_requires_owner() {
    let app = test_app();
    let response = send(&app, start_job(None, json!({ "url": URL }))).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_start_job_rejects_malformed_request() {
    let app = test_app();

    let too_long = format!("https://example.com/{}", "a".repeat(1000));
    let response = send(&app, start_job(Some("u1"), json!({ "url": too_long }))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "validation_failed");
    assert!(body["detail"].as_str().unwrap().contains("url"));

    let response = send(
        &app,
        start_job(Some("u1"), json!({ "url": URL, "resolution": "big" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.jobs.find_by_user("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_audio_job_round_trip() {
    let app = test_app();
    let id = submit(
        &app,
        "u1",
        json!({
            "youtubeUrl": URL,
            "isAudioOnly": true,
            "startTime": "00:00:10",
            "endTime": "00:01:00"
        }),
    )
    .await;

    let job = wait_for_terminal(&app, &id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.file_path.as_deref().unwrap().ends_with(".mp3"));

    let response = send(&app, get(&format!("/jobs/status/{}", id), Some("u1"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "COMPLETED");
    assert_eq!(body["externalId"], id.as_str());
    assert_eq!(body["originalUrl"], URL);
    assert!(body.get("id").is_none());

    let response = send(&app, get(&format!("/jobs/download/{}", id), Some("u1"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"{}.mp3\"", id).as_str()
    );
    assert_eq!(body_bytes(response).await, b"clip-bytes");
}

#[tokio::test]
async fn test_jobs_are_owner_scoped() {
    let app = test_app();
    let id = submit(&app, "u1", json!({ "url": URL, "audioOnly": true })).await;
    wait_for_terminal(&app, &id).await;

    let response = send(&app, get(&format!("/jobs/status/{}", id), Some("u2"))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, get(&format!("/jobs/download/{}", id), Some("u2"))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, get(&format!("/jobs/download/{}", id), None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(&app, get("/jobs", Some("u2"))).await;
    assert_eq!(body_json(response).await, json!([]));

    let response = send(&app, get("/jobs", Some("u1"))).await;
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["externalId"], id.as_str());
}

#[tokio::test]
async fn test_public_download_links() {
    let config = ApiConfig {
        public_download_links: true,
        ..ApiConfig::default()
    };
    let app = build_app(config, 0, 2, 4);
    let id = submit(&app, "u1", json!({ "url": URL, "audioOnly": true })).await;
    wait_for_terminal(&app, &id).await;

    let response = send(&app, get(&format!("/jobs/download/{}", id), None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Status stays owner-scoped.
    let response = send(&app, get(&format!("/jobs/status/{}", id), Some("u2"))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_conflicting_flags_fail_job() {
    let app = test_app();
    let id = submit(
        &app,
        "u1",
        json!({ "url": URL, "audioOnly": true, "videoOnly": true }),
    )
    .await;

    let job = wait_for_terminal(&app, &id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.file_path.is_none());

    let response = send(&app, get(&format!("/jobs/download/{}", id), Some("u1"))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_and_malformed_ids() {
    let app = test_app();

    let response = send(&app, get(&format!("/jobs/status/{}", JobId::new()), Some("u1"))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, get("/jobs/status/not-a-uuid", Some("u1"))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_saturated_executor_answers_503() {
    let app = build_app(ApiConfig::default(), 2, 1, 0);
    let first = submit(&app, "u1", json!({ "url": URL, "audioOnly": true })).await;

    let response = send(&app, start_job(Some("u1"), json!({ "url": URL, "audioOnly": true }))).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["code"], "saturated");

    let jobs = app.jobs.find_by_user("u1").await.unwrap();
    assert_eq!(jobs.len(), 2);
    let rejected = jobs.iter().find(|j| j.external_id != first).unwrap();
    assert_eq!(rejected.status, JobStatus::Failed);

    assert_eq!(wait_for_terminal(&app, &first).await.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_start_job_after_shutdown_answers_shutting_down() {
    let app = test_app();
    assert!(app.executor.shutdown().await);

    let response = send(&app, start_job(Some("u1"), json!({ "url": URL, "audioOnly": true }))).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["code"], "shutting_down");

    let jobs = app.jobs.find_by_user("u1").await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Failed);
}

#[tokio::test]
async fn test_formats_listing() {
    let app = test_app();
    let response = send(&app, get(&format!("/jobs/formats?url={}", URL), None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let ids: Vec<&str> = body["videoFormats"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["137", "136"]);
    assert_eq!(body["videoFormats"][0]["label"], "1920x1080 (30fps)");
    assert_eq!(body["audioFormats"], json!([]));

    let response = send(&app, get("/jobs/formats?url=", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_retention_purges_old_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = Arc::new(InMemoryJobRepository::new());

    let old_file = dir.path().join("old.mp4");
    let fresh_file = dir.path().join("fresh.mp4");
    fs::write(&old_file, b"x").unwrap();
    fs::write(&fresh_file, b"x").unwrap();

    let mut old = Job::new(1, JobId::new(), NewJob::new("u1", URL));
    old.status = JobStatus::Completed;
    old.file_path = Some(old_file.to_string_lossy().to_string());
    old.created_at = Utc::now() - chrono::Duration::hours(48);
    jobs.insert(old.clone()).await.unwrap();

    let mut fresh = Job::new(2, JobId::new(), NewJob::new("u1", URL));
    fresh.status = JobStatus::Completed;
    fresh.file_path = Some(fresh_file.to_string_lossy().to_string());
    jobs.insert(fresh.clone()).await.unwrap();

    let sweeper = RetentionSweeper::new(jobs.clone(), RetentionConfig::default());
    assert_eq!(sweeper.sweep_once().await.unwrap(), 1);

    assert!(!old_file.exists());
    assert!(fresh_file.exists());
    let purged = jobs.find_by_external_id(&old.external_id).await.unwrap().unwrap();
    assert_eq!(purged.file_path.as_deref(), Some(""));
    assert!(purged.is_expired());

    assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
}
