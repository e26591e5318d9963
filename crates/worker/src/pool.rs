//! Fixed-size worker pool with slot recycling.
//!
//! Each queue gets a configured number of polling slots. A slot polls
//! its queue, processes one message at a time, and exits after
//! `recycle_after_tasks` handled messages; the supervisor loop then
//! respawns it fresh.

use std::sync::Arc;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use voicereel_core::job_type::JobType;
use voicereel_engine::HandlerRegistry;

use crate::config::WorkerConfig;
use crate::runner::JobRunner;

pub struct WorkerPool {
    pool: PgPool,
    registry: HandlerRegistry,
    config: Arc<WorkerConfig>,
}

impl WorkerPool {
    pub fn new(pool: PgPool, registry: HandlerRegistry, config: Arc<WorkerConfig>) -> Self {
        Self {
            pool,
            registry,
            config,
        }
    }

    /// Run all slots until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut handles = Vec::new();
        for job_type in JobType::ALL {
            let settings = self.config.queue(job_type);
            for slot in 0..settings.concurrency {
                handles.push(tokio::spawn(supervise_slot(
                    self.pool.clone(),
                    self.registry.clone(),
                    Arc::clone(&self.config),
                    job_type,
                    slot,
                    cancel.clone(),
                )));
            }
            tracing::info!(
                queue = job_type.queue_name(),
                slots = settings.concurrency,
                "Queue slots started"
            );
        }

        for handle in handles {
            let _ = handle.await;
        }
        tracing::info!("Worker pool stopped");
    }
}

/// Respawn a slot's polling loop whenever it recycles.
async fn supervise_slot(
    pool: PgPool,
    registry: HandlerRegistry,
    config: Arc<WorkerConfig>,
    job_type: JobType,
    slot: usize,
    cancel: CancellationToken,
) {
    loop {
        run_slot(&pool, &registry, &config, job_type, slot, &cancel).await;
        if cancel.is_cancelled() {
            tracing::info!(queue = job_type.queue_name(), slot, "Slot shut down");
            return;
        }
        tracing::info!(queue = job_type.queue_name(), slot, "Slot recycled");
    }
}

/// Poll until cancelled or the recycle budget is spent.
async fn run_slot(
    pool: &PgPool,
    registry: &HandlerRegistry,
    config: &Arc<WorkerConfig>,
    job_type: JobType,
    slot: usize,
    cancel: &CancellationToken,
) {
    let runner = JobRunner::new(pool.clone(), registry.clone(), Arc::clone(config));
    let mut handled: u32 = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            result = runner.poll_once(job_type) => match result {
                Ok(true) => {
                    handled += 1;
                    if handled >= config.recycle_after_tasks {
                        return;
                    }
                }
                Ok(false) => {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(config.poll_interval) => {}
                    }
                }
                Err(e) => {
                    tracing::error!(
                        queue = job_type.queue_name(),
                        slot,
                        error = %e,
                        "Poll cycle failed"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(config.poll_interval) => {}
                    }
                }
            }
        }
    }
}
