use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voicereel_engine::client::HttpSpeechEngine;
use voicereel_engine::storage::FsStorage;
use voicereel_engine::{BlobStorage, SpeechEngine};
use voicereel_worker::config::WorkerConfig;
use voicereel_worker::pool::WorkerPool;
use voicereel_worker::{handlers, reaper, scheduler};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voicereel_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env();
    tracing::info!(
        register_slots = config.register_speaker.concurrency,
        synthesize_slots = config.synthesize.concurrency,
        cleanup_slots = config.cleanup.concurrency,
        engine_url = %config.engine_url,
        "Loaded worker configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = voicereel_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");

    voicereel_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    voicereel_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready");

    // --- Collaborators ---
    let engine: Arc<dyn SpeechEngine> = Arc::new(HttpSpeechEngine::new(config.engine_url.clone()));
    let storage: Arc<dyn BlobStorage> = Arc::new(FsStorage::new(config.storage_root.clone()));

    let registry = handlers::build_registry(pool.clone(), engine, storage, &config);

    // --- Background services ---
    let cancel = CancellationToken::new();

    let reaper_handle = tokio::spawn(reaper::run(pool.clone(), config.clone(), cancel.clone()));
    let scheduler_handle =
        tokio::spawn(scheduler::run(pool.clone(), config.clone(), cancel.clone()));

    // --- Worker pool ---
    let worker_pool = WorkerPool::new(pool, registry, Arc::new(config));
    let pool_cancel = cancel.clone();
    let pool_handle = tokio::spawn(async move {
        worker_pool.run(pool_cancel).await;
    });

    shutdown_signal().await;

    // --- Graceful shutdown ---
    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(30), pool_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), scheduler_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), reaper_handle).await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the worker
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
