//! Axum HTTP API server.
//!
//! This crate provides:
//! - Job submission, status, listing and download endpoints
//! - Format discovery
//! - Prometheus metrics
//! - Background retention of finished artifacts

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::{ApiConfig, RetentionConfig};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::{log_outcomes, RetentionSweeper};
pub use state::AppState;
