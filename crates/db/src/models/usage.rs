//! Usage ledger models and aggregate read shapes.

use serde::Serialize;
use sqlx::FromRow;
use voicereel_core::types::{DbId, JobId, Timestamp};

/// An immutable ledger entry: seconds of audio produced by a job.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UsageRecord {
    pub id: DbId,
    pub ts: Timestamp,
    pub length: f64,
    pub job_id: Option<JobId>,
    pub speaker_id: Option<DbId>,
}

/// One day of aggregated usage.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DailyUsage {
    pub date: chrono::NaiveDate,
    pub count: i64,
    pub total_length: f64,
}

/// Monthly usage aggregate with a per-day breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct UsageStats {
    pub count: i64,
    pub total_length: f64,
    pub unique_speakers: i64,
    pub daily: Vec<DailyUsage>,
}
