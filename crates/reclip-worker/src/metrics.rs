//! Job pipeline metrics.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "reclip_jobs_submitted_total";
    pub const JOBS_REJECTED_TOTAL: &str = "reclip_jobs_rejected_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "reclip_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "reclip_jobs_failed_total";
    pub const JOBS_IN_FLIGHT: &str = "reclip_jobs_in_flight";
    pub const JOB_DURATION_SECONDS: &str = "reclip_job_duration_seconds";
    pub const DOWNLOAD_DURATION_SECONDS: &str = "reclip_download_duration_seconds";
    pub const FFMPEG_DURATION_SECONDS: &str = "reclip_ffmpeg_duration_seconds";
}

pub fn record_job_submitted(mode: &str) {
    counter!(names::JOBS_SUBMITTED_TOTAL, "mode" => mode.to_string()).increment(1);
}

pub fn record_job_rejected() {
    counter!(names::JOBS_REJECTED_TOTAL).increment(1);
}

pub fn record_job_completed(duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    histogram!(names::JOB_DURATION_SECONDS).record(duration_secs);
}

pub fn record_job_failed(reason: &str) {
    counter!(names::JOBS_FAILED_TOTAL, "reason" => reason.to_string()).increment(1);
}

pub fn set_jobs_in_flight(count: usize) {
    gauge!(names::JOBS_IN_FLIGHT).set(count as f64);
}

pub fn record_download_duration(stream: &str, duration_secs: f64) {
    histogram!(names::DOWNLOAD_DURATION_SECONDS, "stream" => stream.to_string())
        .record(duration_secs);
}

pub fn record_ffmpeg_duration(mode: &str, duration_secs: f64) {
    histogram!(names::FFMPEG_DURATION_SECONDS, "mode" => mode.to_string()).record(duration_secs);
}
