//! Axum API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reclip_api::{create_router, log_outcomes, metrics, ApiConfig, AppState, RetentionConfig, RetentionSweeper};
use reclip_store::InMemoryJobRepository;
use reclip_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("reclip=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting reclip-api");

    // Load configuration
    let config = ApiConfig::from_env();
    let worker_config = WorkerConfig::from_env();
    let retention_config = RetentionConfig::from_env();
    info!("API config: host={}, port={}", config.host, config.port);
    info!("Worker config: {:?}", worker_config);

    if config.public_download_links {
        warn!("Public download links enabled: any caller with a job id can fetch its file");
    }

    let metrics_handle = if config.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics().context("failed to install Prometheus recorder")?)
    } else {
        None
    };

    // Create application state
    let jobs = Arc::new(InMemoryJobRepository::new());
    let state = AppState::new(config.clone(), &worker_config, jobs.clone());

    // Background services
    if let Some(outcomes) = state.executor.outcomes() {
        tokio::spawn(log_outcomes(outcomes));
    }
    let sweeper = RetentionSweeper::new(jobs, retention_config);
    tokio::spawn(async move {
        sweeper.run().await;
    });

    let executor = Arc::clone(&state.executor);
    let app = create_router(state, metrics_handle);

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid bind address")?;

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if !executor.shutdown().await {
        error!("Exiting with jobs still in flight");
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
