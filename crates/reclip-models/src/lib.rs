//! Shared data models for the reclip job service.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, their status machine and progress throttling
//! - Job submission requests and processing modes
//! - Video format candidates reported by format discovery
//! - Timestamp parsing shared by validation and progress parsing

pub mod format;
pub mod job;
pub mod request;
pub mod timestamp;

// Re-export common types
pub use format::{AudioFormat, FormatsResponse, VideoFormat};
pub use job::{Job, JobId, JobStatus, JobUpdate, NewJob};
pub use request::{parse_resolution, JobRequest, ProcessingMode, RequestError};
pub use timestamp::{parse_timestamp, TimestampError, TrimRange};
