//! Crux API server binary.
//!
//! Hosts the HTTP boundary and the ingestion worker in one process.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crux_api::{create_router, metrics, ApiConfig, AppState};
use crux_db::{CachedJobStore, DbConfig, JobStore, PgJobStore};
use crux_media::FfmpegRunner;
use crux_storage::{ObjectStore, R2Client};
use crux_worker::{Reconciler, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting crux-api");

    let config = ApiConfig::from_env();
    let worker_config = WorkerConfig::from_env();
    info!(
        "API config: host={}, port={}, max_jobs={}",
        config.host, config.port, worker_config.max_concurrent_jobs
    );

    let started_at = Utc::now();

    let db_config = DbConfig::from_env()?;
    let pg = PgJobStore::connect(&db_config)
        .await
        .context("failed to connect to PostgreSQL")?;
    pg.migrate().await?;
    let jobs: Arc<dyn JobStore> = Arc::new(CachedJobStore::new(pg));

    let storage: Arc<dyn ObjectStore> = Arc::new(R2Client::from_env()?);

    let runner = match &worker_config.ffmpeg_path {
        Some(path) => FfmpegRunner::new().with_binary(path),
        None => FfmpegRunner::new(),
    };
    match runner.resolve_binary() {
        Ok(path) => info!("Using FFmpeg at {}", path.display()),
        Err(e) => warn!("{}; uploads will fail until it is installed", e),
    }

    // Rows still processing were owned by a previous process.
    let cutoff = started_at
        - chrono::Duration::from_std(worker_config.stale_after).unwrap_or_else(|_| chrono::Duration::zero());
    let reconciler = Reconciler::new(Arc::clone(&jobs), &worker_config.work_dir);
    if let Err(e) = reconciler.run_once(cutoff).await {
        error!("Startup reconciliation failed: {:#}", e);
    }

    let metrics_handle = if config.metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => {
                info!("Prometheus metrics enabled at /metrics");
                Some(handle)
            }
            Err(e) => {
                warn!("Failed to install Prometheus recorder: {}", e);
                None
            }
        }
    } else {
        None
    };

    let shutdown_timeout = worker_config.shutdown_timeout;
    let state = AppState::new(config.clone(), worker_config, jobs, storage);
    let ingest = Arc::clone(&state.ingest);
    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("invalid bind address {}", config.bind_address()))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Waiting for in-flight jobs to finish...");
    if !ingest.wait_idle(shutdown_timeout).await {
        warn!("Shutting down with jobs still running; they will be failed on next start");
    }

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("crux=info"));

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
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
