//! Queue broker models: messages, leases, and dead letters.

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;
use voicereel_core::types::{DbId, JobId, Timestamp};

/// Exclusive, time-bounded visibility of a dequeued message.
///
/// The token is rotated on every claim; `ack`/`nack` only act if the
/// stored token still matches, so an expired lease that was re-claimed
/// by another worker cannot be acknowledged twice.
#[derive(Debug, Clone, FromRow)]
pub struct Lease {
    #[sqlx(rename = "id")]
    pub message_id: DbId,
    #[sqlx(rename = "lease_token")]
    pub token: Uuid,
    pub queue: String,
    pub job_id: JobId,
    pub payload: serde_json::Value,
    pub delivery_count: i32,
}

/// A message that exhausted its redelivery budget.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DeadLetter {
    pub id: DbId,
    pub queue: String,
    pub job_id: JobId,
    pub payload: serde_json::Value,
    pub delivery_count: i32,
    pub reason: Option<String>,
    pub created_at: Timestamp,
    pub dead_lettered_at: Timestamp,
}

/// Result of a negative acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackOutcome {
    /// The message becomes visible again after the requested delay.
    Requeued,
    /// The delivery budget was spent; the message moved to `dead_letters`.
    DeadLettered,
    /// The lease no longer matched (expired and re-claimed elsewhere).
    LeaseLost,
}
