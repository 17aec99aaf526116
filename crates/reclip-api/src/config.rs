//! API configuration.

use std::time::Duration;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Serve downloads to any caller holding the job id
    pub public_download_links: bool,
    /// Expose Prometheus metrics at /metrics
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_body_size: 64 * 1024, // 64KB
            environment: "development".to_string(),
            public_download_links: false,
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            public_download_links: env_flag("PUBLIC_DOWNLOAD_LINKS", false),
            metrics_enabled: env_flag("METRICS_ENABLED", true),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

/// Artifact retention settings.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub enabled: bool,
    /// Time between sweeps
    pub interval: Duration,
    /// Age after which a completed job's file is deleted
    pub max_age: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(3600),
            max_age: Duration::from_secs(24 * 3600),
        }
    }
}

impl RetentionConfig {
    pub fn from_env() -> Self {
        Self {
            enabled: env_flag("RETENTION_ENABLED", true),
            interval: Duration::from_secs(
                std::env::var("RETENTION_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|n| *n > 0)
                    .unwrap_or(3600),
            ),
            max_age: Duration::from_secs(
                std::env::var("RETENTION_MAX_AGE_HOURS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(24)
                    * 3600,
            ),
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}
