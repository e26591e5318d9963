//! Single-message processing: claim, execute under time limits, resolve.
//!
//! The broker only promises at-least-once delivery, so exactly-once
//! execution is enforced here: a delivered message is only acted on if
//! the `pending -> processing` compare-and-set wins. Duplicate
//! deliveries lose the CAS and are acknowledged without running the
//! handler.

use std::sync::Arc;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use voicereel_core::job_type::JobType;
use voicereel_core::types::JobId;
use voicereel_db::error::StoreError;
use voicereel_db::models::job::Job;
use voicereel_db::models::queue::{Lease, NackOutcome};
use voicereel_db::models::status::JobStatus;
use voicereel_db::repositories::{JobRepo, QueueRepo, UsageEntry};
use voicereel_engine::error::{codes, TaskError};
use voicereel_engine::registry::TaskOutcome;
use voicereel_engine::{HandlerRegistry, TaskContext};

use crate::config::WorkerConfig;

/// Claims and resolves one broker message at a time.
pub struct JobRunner {
    pool: PgPool,
    registry: HandlerRegistry,
    config: Arc<WorkerConfig>,
}

impl JobRunner {
    pub fn new(pool: PgPool, registry: HandlerRegistry, config: Arc<WorkerConfig>) -> Self {
        Self {
            pool,
            registry,
            config,
        }
    }

    /// Claim and process at most one message from the job type's queue.
    ///
    /// Returns `true` if a message was consumed (whether or not the
    /// handler ran), `false` if the queue was empty.
    pub async fn poll_once(&self, job_type: JobType) -> Result<bool, StoreError> {
        let queue = job_type.queue_name();
        let Some(lease) = QueueRepo::dequeue(&self.pool, queue, self.config.lease_duration).await?
        else {
            return Ok(false);
        };

        let Some(job) = JobRepo::find_by_id(&self.pool, lease.job_id).await? else {
            // The reaper got there first; the message is moot.
            tracing::warn!(job_id = %lease.job_id, queue, "Message for a deleted job, dropping");
            QueueRepo::ack(&self.pool, &lease).await?;
            return Ok(true);
        };

        // Cancellation that arrived while the job sat in the queue.
        if job.cancel_requested && job.status() == Some(JobStatus::Pending) {
            match JobRepo::transition(
                &self.pool,
                job.id,
                JobStatus::Pending,
                JobStatus::Cancelled,
                None,
            )
            .await
            {
                Ok(_) => tracing::info!(job_id = %job.id, "Cancelled before dispatch"),
                // Already moved by the cancel endpoint itself.
                Err(StoreError::Conflict { .. }) => {}
                Err(e) => return Err(e),
            }
            QueueRepo::ack(&self.pool, &lease).await?;
            return Ok(true);
        }

        // Claim: the sole writer privilege for this job comes from
        // winning this CAS, not from holding the lease.
        let claimed = match JobRepo::transition(
            &self.pool,
            job.id,
            JobStatus::Pending,
            JobStatus::Processing,
            None,
        )
        .await
        {
            Ok(job) => job,
            Err(StoreError::Conflict { actual, .. }) => {
                tracing::debug!(
                    job_id = %job.id,
                    ?actual,
                    "Lost the claim, acknowledging duplicate delivery"
                );
                QueueRepo::ack(&self.pool, &lease).await?;
                return Ok(true);
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            job_id = %claimed.id,
            job_type = %job_type,
            attempt = claimed.attempt_count,
            delivery = lease.delivery_count,
            "Job claimed"
        );

        let result = self.execute(job_type, &claimed).await;
        self.resolve(job_type, &claimed, &lease, result).await?;
        Ok(true)
    }

    /// Run the registered handler under the queue's time limits, with a
    /// watcher task relaying `cancel_requested` into the task context.
    async fn execute(&self, job_type: JobType, job: &Job) -> Result<TaskOutcome, TaskError> {
        let Some(handler) = self.registry.get(job_type) else {
            return Err(TaskError::fatal(
                codes::INTERNAL,
                format!("no handler registered for job type {job_type}"),
            ));
        };

        let settings = *self.config.queue(job_type);
        let cancel = CancellationToken::new();
        let ctx = TaskContext::new(job.id, job.attempt_count, cancel.clone());

        let watcher = tokio::spawn(watch_cancel_flag(
            self.pool.clone(),
            job.id,
            self.config.cancel_poll_interval,
            cancel.clone(),
        ));

        let result = tokio::select! {
            res = run_with_soft_limit(
                handler.run(&ctx, &job.metadata),
                settings.soft_time_limit,
                job.id,
            ) => res,
            _ = tokio::time::sleep(settings.hard_time_limit) => {
                tracing::error!(
                    job_id = %job.id,
                    limit_secs = settings.hard_time_limit.as_secs(),
                    "Hard time limit hit, aborting handler"
                );
                Err(TaskError::fatal(
                    codes::TIMEOUT,
                    format!(
                        "handler exceeded the {}s hard time limit",
                        settings.hard_time_limit.as_secs()
                    ),
                ))
            }
        };

        watcher.abort();
        result
    }

    /// Apply the handler's verdict to the job store and the broker.
    async fn resolve(
        &self,
        job_type: JobType,
        job: &Job,
        lease: &Lease,
        result: Result<TaskOutcome, TaskError>,
    ) -> Result<(), StoreError> {
        match result {
            Ok(outcome) => {
                let usage = outcome.usage.map(|u| UsageEntry {
                    length: u.length,
                    speaker_id: u.speaker_id,
                });
                let patch = outcome.patch.is_object().then_some(&outcome.patch);
                match JobRepo::succeed_with_usage(&self.pool, job.id, patch, usage).await {
                    Ok(_) => {
                        tracing::info!(job_id = %job.id, job_type = %job_type, "Job succeeded")
                    }
                    // Someone else already resolved the job; nothing to record.
                    Err(StoreError::Conflict { actual, .. }) => {
                        tracing::warn!(job_id = %job.id, ?actual, "Success lost the CAS")
                    }
                    Err(e) => return Err(e),
                }
                QueueRepo::ack(&self.pool, lease).await?;
            }

            Err(TaskError::Cancelled) => {
                let patch = error_patch(codes::CANCELLED, "cancelled by request");
                match JobRepo::transition(
                    &self.pool,
                    job.id,
                    JobStatus::Processing,
                    JobStatus::Cancelled,
                    Some(&patch),
                )
                .await
                {
                    Ok(_) => tracing::info!(job_id = %job.id, "Job cancelled mid-run"),
                    Err(StoreError::Conflict { actual, .. }) => {
                        tracing::warn!(job_id = %job.id, ?actual, "Cancellation lost the CAS")
                    }
                    Err(e) => return Err(e),
                }
                QueueRepo::ack(&self.pool, lease).await?;
            }

            Err(TaskError::Fatal { code, message }) => {
                tracing::warn!(job_id = %job.id, code, %message, "Job failed");
                let patch = error_patch(&code, &message);
                match JobRepo::transition(
                    &self.pool,
                    job.id,
                    JobStatus::Processing,
                    JobStatus::Failed,
                    Some(&patch),
                )
                .await
                {
                    Ok(_) | Err(StoreError::Conflict { .. }) => {}
                    Err(e) => return Err(e),
                }
                QueueRepo::ack(&self.pool, lease).await?;
            }

            Err(TaskError::Transient(message)) => {
                let policy = self.config.retry_policy(job_type);
                if policy.is_exhausted(job.attempt_count) {
                    tracing::warn!(
                        job_id = %job.id,
                        attempts = job.attempt_count,
                        %message,
                        "Retry budget spent, failing job"
                    );
                    let patch = error_patch(codes::RETRIES_EXHAUSTED, &message);
                    match JobRepo::transition(
                        &self.pool,
                        job.id,
                        JobStatus::Processing,
                        JobStatus::Failed,
                        Some(&patch),
                    )
                    .await
                    {
                        Ok(_) | Err(StoreError::Conflict { .. }) => {}
                        Err(e) => return Err(e),
                    }
                    QueueRepo::ack(&self.pool, lease).await?;
                } else {
                    let delay = policy.backoff_delay(job.attempt_count);
                    tracing::info!(
                        job_id = %job.id,
                        attempt = job.attempt_count,
                        delay_secs = delay.as_secs(),
                        %message,
                        "Transient failure, requeueing"
                    );
                    let patch = serde_json::json!({
                        "last_error": { "code": codes::INTERNAL, "message": message },
                    });
                    match JobRepo::transition(
                        &self.pool,
                        job.id,
                        JobStatus::Processing,
                        JobStatus::Pending,
                        Some(&patch),
                    )
                    .await
                    {
                        Ok(_) | Err(StoreError::Conflict { .. }) => {}
                        Err(e) => return Err(e),
                    }
                    let outcome = QueueRepo::nack(
                        &self.pool,
                        lease,
                        delay,
                        self.config.max_deliveries,
                        Some(&message),
                    )
                    .await?;
                    if outcome == NackOutcome::DeadLettered {
                        // Should not happen while max_deliveries exceeds
                        // the retry budget; fail the job rather than
                        // strand it in pending.
                        tracing::error!(job_id = %job.id, "Message dead-lettered mid-retry");
                        self.force_fail(job.id, &message).await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Drive a stranded pending job to failed through the only legal
    /// path (`pending -> processing -> failed`).
    async fn force_fail(&self, id: JobId, message: &str) -> Result<(), StoreError> {
        match JobRepo::transition(&self.pool, id, JobStatus::Pending, JobStatus::Processing, None)
            .await
        {
            Ok(_) => {}
            Err(StoreError::Conflict { .. }) => return Ok(()),
            Err(e) => return Err(e),
        }
        let patch = error_patch(codes::RETRIES_EXHAUSTED, message);
        match JobRepo::transition(
            &self.pool,
            id,
            JobStatus::Processing,
            JobStatus::Failed,
            Some(&patch),
        )
        .await
        {
            Ok(_) | Err(StoreError::Conflict { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Await the handler, logging once the soft limit passes. The handler
/// keeps running; only the hard limit aborts it.
async fn run_with_soft_limit(
    fut: impl std::future::Future<Output = Result<TaskOutcome, TaskError>>,
    soft_limit: std::time::Duration,
    job_id: JobId,
) -> Result<TaskOutcome, TaskError> {
    let soft = tokio::time::sleep(soft_limit);
    tokio::pin!(soft);
    tokio::pin!(fut);
    let mut soft_fired = false;
    loop {
        tokio::select! {
            res = &mut fut => return res,
            _ = &mut soft, if !soft_fired => {
                soft_fired = true;
                tracing::warn!(
                    job_id = %job_id,
                    limit_secs = soft_limit.as_secs(),
                    "Soft time limit exceeded, letting the handler finish"
                );
            }
        }
    }
}

/// Poll `cancel_requested` while a handler runs and relay it into the
/// cancellation token.
async fn watch_cancel_flag(
    pool: PgPool,
    job_id: JobId,
    poll_interval: std::time::Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(poll_interval);
    loop {
        interval.tick().await;
        match JobRepo::find_by_id(&pool, job_id).await {
            Ok(Some(job)) if job.cancel_requested => {
                tracing::info!(job_id = %job_id, "Cancellation requested, signalling handler");
                cancel.cancel();
                return;
            }
            Ok(Some(_)) => {}
            Ok(None) => return,
            Err(e) => tracing::error!(job_id = %job_id, error = %e, "Cancel flag poll failed"),
        }
    }
}

fn error_patch(code: &str, message: &str) -> serde_json::Value {
    serde_json::json!({ "error": { "code": code, "message": message } })
}
