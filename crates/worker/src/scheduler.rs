//! Interval scheduler for housekeeping jobs.
//!
//! Enqueues a `cleanup` job on a fixed interval. The job travels
//! through the same broker and worker machinery as client submissions,
//! so artifact expiry competes for a slot instead of blocking one.

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use voicereel_core::job_type::JobType;
use voicereel_db::repositories::JobRepo;

use crate::config::WorkerConfig;

/// Run the cleanup scheduling loop until `cancel` is triggered.
pub async fn run(pool: PgPool, config: WorkerConfig, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = config.cleanup_interval.as_secs(),
        max_age_hours = config.max_age_hours,
        "Cleanup scheduler started"
    );

    let mut interval = tokio::time::interval(config.cleanup_interval);
    // The first tick fires immediately; skip it so startup does not
    // always enqueue a cleanup.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Cleanup scheduler stopping");
                break;
            }
            _ = interval.tick() => {
                let metadata = serde_json::json!({ "max_age_hours": config.max_age_hours });
                match JobRepo::create_and_enqueue(&pool, JobType::Cleanup, &metadata).await {
                    Ok(job) => tracing::info!(job_id = %job.id, "Cleanup job enqueued"),
                    Err(e) => tracing::error!(error = %e, "Failed to enqueue cleanup job"),
                }
            }
        }
    }
}
