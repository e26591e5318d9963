//! Repository for the append-only `usage` ledger.

use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};
use voicereel_core::types::{DbId, JobId};

use crate::error::StoreError;
use crate::models::usage::{DailyUsage, UsageRecord, UsageStats};

pub struct UsageRepo;

impl UsageRepo {
    /// Append a usage row. Idempotent per job: the partial unique index
    /// on `job_id` makes a second insert for the same job a no-op.
    pub async fn record(
        pool: &PgPool,
        length: f64,
        job_id: Option<JobId>,
        speaker_id: Option<DbId>,
    ) -> Result<(), StoreError> {
        let mut conn = pool.acquire().await?;
        Self::record_on(&mut conn, length, job_id, speaker_id).await
    }

    /// Record on an explicit connection, usable inside the same
    /// transaction as the job's `succeeded` transition.
    pub async fn record_on(
        conn: &mut PgConnection,
        length: f64,
        job_id: Option<JobId>,
        speaker_id: Option<DbId>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO usage (length, job_id, speaker_id) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (job_id) WHERE job_id IS NOT NULL DO NOTHING",
        )
        .bind(length)
        .bind(job_id)
        .bind(speaker_id)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// All rows referencing a job. Used by tests and the reaper path.
    pub async fn find_by_job(pool: &PgPool, job_id: JobId) -> Result<Vec<UsageRecord>, StoreError> {
        let rows = sqlx::query_as::<_, UsageRecord>(
            "SELECT id, ts, length, job_id, speaker_id FROM usage WHERE job_id = $1",
        )
        .bind(job_id)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    /// Monthly aggregate with a per-day breakdown, no side effects.
    pub async fn stats(pool: &PgPool, year: i32, month: u32) -> Result<UsageStats, StoreError> {
        let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            StoreError::Database(sqlx::Error::Protocol(format!(
                "invalid stats period {year}-{month}"
            )))
        })?;
        let end = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .expect("first of month is always valid");

        let (count, total_length, unique_speakers): (i64, f64, i64) = sqlx::query_as(
            "SELECT COUNT(*), \
                    COALESCE(SUM(length), 0)::DOUBLE PRECISION, \
                    COUNT(DISTINCT speaker_id) \
             FROM usage WHERE ts >= $1 AND ts < $2",
        )
        .bind(start)
        .bind(end)
        .fetch_one(pool)
        .await?;

        let daily = sqlx::query_as::<_, DailyUsage>(
            "SELECT ts::date AS date, \
                    COUNT(*) AS count, \
                    COALESCE(SUM(length), 0)::DOUBLE PRECISION AS total_length \
             FROM usage WHERE ts >= $1 AND ts < $2 \
             GROUP BY ts::date \
             ORDER BY date",
        )
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await?;

        Ok(UsageStats {
            count,
            total_length,
            unique_speakers,
            daily,
        })
    }
}
