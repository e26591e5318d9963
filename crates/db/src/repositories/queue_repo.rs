//! Postgres-backed queue broker.
//!
//! At-least-once delivery: a dequeue claims the earliest visible message
//! with `FOR UPDATE SKIP LOCKED` and pushes its `visible_at` past the
//! lease duration. If the holder never acks, the message simply becomes
//! claimable again. Redelivery is bounded by `delivery_count`; beyond
//! the budget a nack routes the message to `dead_letters` instead.

use std::time::Duration;

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use voicereel_core::types::{DbId, JobId};

use crate::models::queue::{DeadLetter, Lease, NackOutcome};

const LEASE_COLUMNS: &str = "id, lease_token, queue, job_id, payload, delivery_count";

/// Provides the broker contract: enqueue, dequeue (lease), ack, nack.
pub struct QueueRepo;

impl QueueRepo {
    /// Append a message to the named queue, immediately visible.
    pub async fn enqueue(
        pool: &PgPool,
        queue: &str,
        job_id: JobId,
        payload: &serde_json::Value,
    ) -> Result<DbId, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::enqueue_on(&mut conn, queue, job_id, payload).await
    }

    /// Enqueue on an explicit connection, usable inside transactions.
    pub async fn enqueue_on(
        conn: &mut PgConnection,
        queue: &str,
        job_id: JobId,
        payload: &serde_json::Value,
    ) -> Result<DbId, sqlx::Error> {
        let (id,): (DbId,) = sqlx::query_as(
            "INSERT INTO queue_messages (queue, job_id, payload) \
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(queue)
        .bind(job_id)
        .bind(payload)
        .fetch_one(conn)
        .await?;
        Ok(id)
    }

    /// Claim the earliest visible message, if any.
    ///
    /// The returned lease grants exclusive visibility for
    /// `lease_duration`; the claim bumps `delivery_count` and rotates
    /// the lease token. Concurrent dequeuers skip locked rows, so two
    /// workers can never claim the same message at the same instant.
    pub async fn dequeue(
        pool: &PgPool,
        queue: &str,
        lease_duration: Duration,
    ) -> Result<Option<Lease>, sqlx::Error> {
        let query = format!(
            "UPDATE queue_messages SET \
                 visible_at = NOW() + make_interval(secs => $2), \
                 lease_token = $3, \
                 delivery_count = delivery_count + 1 \
             WHERE id = ( \
                 SELECT id FROM queue_messages \
                 WHERE queue = $1 AND visible_at <= NOW() \
                 ORDER BY id \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {LEASE_COLUMNS}"
        );
        sqlx::query_as::<_, Lease>(&query)
            .bind(queue)
            .bind(lease_duration.as_secs_f64())
            .bind(Uuid::new_v4())
            .fetch_optional(pool)
            .await
    }

    /// Permanently remove an acknowledged message.
    ///
    /// Returns `false` if the lease no longer matched (it expired and
    /// the message was re-claimed or already removed).
    pub async fn ack(pool: &PgPool, lease: &Lease) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM queue_messages WHERE id = $1 AND lease_token = $2")
            .bind(lease.message_id)
            .bind(lease.token)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Return a message to the queue after a delay, or dead-letter it
    /// once `delivery_count` has reached `max_deliveries`.
    pub async fn nack(
        pool: &PgPool,
        lease: &Lease,
        requeue_after: Duration,
        max_deliveries: i32,
        reason: Option<&str>,
    ) -> Result<NackOutcome, sqlx::Error> {
        if lease.delivery_count >= max_deliveries {
            let moved = sqlx::query(
                "WITH doomed AS ( \
                     DELETE FROM queue_messages \
                     WHERE id = $1 AND lease_token = $2 \
                     RETURNING queue, job_id, payload, delivery_count, created_at \
                 ) \
                 INSERT INTO dead_letters \
                     (queue, job_id, payload, delivery_count, reason, created_at) \
                 SELECT queue, job_id, payload, delivery_count, $3, created_at FROM doomed",
            )
            .bind(lease.message_id)
            .bind(lease.token)
            .bind(reason)
            .execute(pool)
            .await?;
            return Ok(if moved.rows_affected() > 0 {
                NackOutcome::DeadLettered
            } else {
                NackOutcome::LeaseLost
            });
        }

        let result = sqlx::query(
            "UPDATE queue_messages SET \
                 visible_at = NOW() + make_interval(secs => $3), \
                 lease_token = NULL \
             WHERE id = $1 AND lease_token = $2",
        )
        .bind(lease.message_id)
        .bind(lease.token)
        .bind(requeue_after.as_secs_f64())
        .execute(pool)
        .await?;
        Ok(if result.rows_affected() > 0 {
            NackOutcome::Requeued
        } else {
            NackOutcome::LeaseLost
        })
    }

    /// Number of messages currently visible on a queue (backlog).
    pub async fn depth(pool: &PgPool, queue: &str) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM queue_messages WHERE queue = $1 AND visible_at <= NOW()",
        )
        .bind(queue)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    /// Dead letters for a queue, newest first.
    pub async fn dead_letters(pool: &PgPool, queue: &str) -> Result<Vec<DeadLetter>, sqlx::Error> {
        sqlx::query_as::<_, DeadLetter>(
            "SELECT id, queue, job_id, payload, delivery_count, reason, \
                    created_at, dead_lettered_at \
             FROM dead_letters WHERE queue = $1 \
             ORDER BY dead_lettered_at DESC",
        )
        .bind(queue)
        .fetch_all(pool)
        .await
    }
}
