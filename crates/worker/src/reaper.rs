//! Periodic purge of old terminal jobs.
//!
//! Deletes jobs whose `completed_at` is older than the retention window,
//! together with their usage rows. Runs on a fixed interval using
//! `tokio::time::interval`.

use chrono::Utc;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use voicereel_db::repositories::JobRepo;

use crate::config::WorkerConfig;

/// Run the reaper loop until `cancel` is triggered.
pub async fn run(pool: PgPool, config: WorkerConfig, cancel: CancellationToken) {
    tracing::info!(
        max_age_hours = config.max_age_hours,
        interval_secs = config.reaper_interval.as_secs(),
        "Reaper started"
    );

    let mut interval = tokio::time::interval(config.reaper_interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Reaper stopping");
                break;
            }
            _ = interval.tick() => {
                let cutoff = Utc::now()
                    - chrono::Duration::milliseconds((config.max_age_hours * 3_600_000.0) as i64);
                match JobRepo::sweep(&pool, cutoff).await {
                    Ok(removed) if !removed.is_empty() => {
                        tracing::info!(removed = removed.len(), "Reaper: purged old jobs");
                    }
                    Ok(_) => {
                        tracing::debug!("Reaper: nothing to purge");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Reaper: sweep failed");
                    }
                }
            }
        }
    }
}
