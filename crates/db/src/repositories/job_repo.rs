//! Repository for the `jobs` table.
//!
//! `transition` is the sole status mutation primitive: an atomic
//! compare-and-set keyed on the expected status. Everything else
//! (claiming, completion, retry, cancellation) funnels through it, which
//! is what guarantees at most one active worker per job even though the
//! broker only promises at-least-once delivery.

use sqlx::{PgConnection, PgPool};
use voicereel_core::job_type::JobType;
use voicereel_core::types::JobId;

use crate::error::StoreError;
use crate::models::job::{Job, JobListQuery};
use crate::models::status::JobStatus;
use crate::repositories::{QueueRepo, UsageRepo};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, job_type, status_id, attempt_count, cancel_requested, metadata, \
    created_at, updated_at, started_at, completed_at";

/// Maximum page size for job listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for job listing.
const DEFAULT_LIMIT: i64 = 50;

/// Usage figures recorded atomically with a `succeeded` transition.
#[derive(Debug, Clone, Copy)]
pub struct UsageEntry {
    /// Seconds of audio produced.
    pub length: f64,
    pub speaker_id: Option<voicereel_core::types::DbId>,
}

/// Provides CRUD operations and the CAS transition for jobs.
pub struct JobRepo;

impl JobRepo {
    /// Create a new job in `pending` with `attempt_count = 0`.
    ///
    /// Metadata is assumed to be already validated against the type's
    /// schema (`voicereel_core::validation`).
    pub async fn create(
        pool: &PgPool,
        job_type: JobType,
        metadata: &serde_json::Value,
    ) -> Result<Job, StoreError> {
        let query = format!(
            "INSERT INTO jobs (job_type, status_id, metadata) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        let job = sqlx::query_as::<_, Job>(&query)
            .bind(job_type.as_str())
            .bind(JobStatus::Pending.id())
            .bind(metadata)
            .fetch_one(pool)
            .await?;
        Ok(job)
    }

    /// Create a job and enqueue its broker message in one transaction,
    /// so a submitted job can never exist without a message (or vice
    /// versa).
    pub async fn create_and_enqueue(
        pool: &PgPool,
        job_type: JobType,
        metadata: &serde_json::Value,
    ) -> Result<Job, StoreError> {
        let mut tx = pool.begin().await?;
        let query = format!(
            "INSERT INTO jobs (job_type, status_id, metadata) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        let job = sqlx::query_as::<_, Job>(&query)
            .bind(job_type.as_str())
            .bind(JobStatus::Pending.id())
            .bind(metadata)
            .fetch_one(&mut *tx)
            .await?;
        QueueRepo::enqueue_on(&mut *tx, job_type.queue_name(), job.id, &serde_json::json!({}))
            .await?;
        tx.commit().await?;
        Ok(job)
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: JobId) -> Result<Option<Job>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        let job = sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(job)
    }

    /// Like [`Self::find_by_id`] but maps absence to `NotFound`.
    pub async fn get(pool: &PgPool, id: JobId) -> Result<Job, StoreError> {
        Self::find_by_id(pool, id)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "Job",
                id: id.to_string(),
            })
    }

    /// Atomic compare-and-set status transition.
    ///
    /// Succeeds only if the stored status equals `expected`; otherwise
    /// returns `Conflict` with the status actually found (another worker
    /// already moved the job). `metadata_patch` is merged by key into
    /// the existing metadata, never replacing it wholesale.
    ///
    /// Side effects applied in the same UPDATE:
    /// - `-> processing`: `attempt_count + 1`, `started_at` set once;
    /// - `-> succeeded | failed | cancelled`: `completed_at` set.
    pub async fn transition(
        pool: &PgPool,
        id: JobId,
        expected: JobStatus,
        new: JobStatus,
        metadata_patch: Option<&serde_json::Value>,
    ) -> Result<Job, StoreError> {
        let mut conn = pool.acquire().await?;
        Self::transition_on(&mut conn, id, expected, new, metadata_patch).await
    }

    /// Transition on an explicit connection, usable inside transactions.
    pub async fn transition_on(
        conn: &mut PgConnection,
        id: JobId,
        expected: JobStatus,
        new: JobStatus,
        metadata_patch: Option<&serde_json::Value>,
    ) -> Result<Job, StoreError> {
        if !expected.can_transition_to(new) {
            return Err(StoreError::InvalidTransition {
                from: expected,
                to: new,
            });
        }

        let bump_attempt = new == JobStatus::Processing;
        let set_completed = new.is_terminal();

        let query = format!(
            "UPDATE jobs SET \
                 status_id = $1, \
                 metadata = metadata || COALESCE($2, '{{}}'::jsonb), \
                 attempt_count = attempt_count + $3, \
                 started_at = CASE WHEN $4 THEN COALESCE(started_at, NOW()) ELSE started_at END, \
                 completed_at = CASE WHEN $5 THEN NOW() ELSE completed_at END, \
                 updated_at = NOW() \
             WHERE id = $6 AND status_id = $7 \
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Job>(&query)
            .bind(new.id())
            .bind(metadata_patch)
            .bind(if bump_attempt { 1i32 } else { 0i32 })
            .bind(bump_attempt)
            .bind(set_completed)
            .bind(id)
            .bind(expected.id())
            .fetch_optional(&mut *conn)
            .await?;

        match updated {
            Some(job) => Ok(job),
            None => {
                // Lost the race or the job is gone; report which.
                let current: Option<(i16,)> =
                    sqlx::query_as("SELECT status_id FROM jobs WHERE id = $1")
                        .bind(id)
                        .fetch_optional(&mut *conn)
                        .await?;
                match current {
                    Some((status_id,)) => Err(StoreError::Conflict {
                        id: id.to_string(),
                        expected,
                        actual: JobStatus::from_id(status_id),
                    }),
                    None => Err(StoreError::NotFound {
                        entity: "Job",
                        id: id.to_string(),
                    }),
                }
            }
        }
    }

    /// Transition `processing -> succeeded` and insert the usage row in
    /// one transaction.
    ///
    /// The usage insert is `ON CONFLICT (job_id) DO NOTHING`, so a
    /// crash between commit and broker ack followed by a redelivery
    /// cannot double-count (the redelivered message just loses the CAS).
    pub async fn succeed_with_usage(
        pool: &PgPool,
        id: JobId,
        metadata_patch: Option<&serde_json::Value>,
        usage: Option<UsageEntry>,
    ) -> Result<Job, StoreError> {
        let mut tx = pool.begin().await?;
        let job = Self::transition_on(
            &mut *tx,
            id,
            JobStatus::Processing,
            JobStatus::Succeeded,
            metadata_patch,
        )
        .await?;
        if let Some(entry) = usage {
            UsageRepo::record_on(&mut *tx, entry.length, Some(id), entry.speaker_id).await?;
        }
        tx.commit().await?;
        Ok(job)
    }

    /// Request cancellation of a non-terminal job.
    ///
    /// Sets the `cancel_requested` flag, then moves a still-`pending`
    /// job through the `pending -> cancelled` CAS. A `processing` job
    /// keeps running; the worker holding the lease observes the flag at
    /// its next safe point. Returns the updated row, or `Conflict` if
    /// the job is already terminal.
    pub async fn request_cancel(pool: &PgPool, id: JobId) -> Result<Job, StoreError> {
        let flag_query = format!(
            "UPDATE jobs SET cancel_requested = TRUE, updated_at = NOW() \
             WHERE id = $1 AND status_id IN ($2, $3) \
             RETURNING {COLUMNS}"
        );
        loop {
            let flagged = sqlx::query_as::<_, Job>(&flag_query)
                .bind(id)
                .bind(JobStatus::Pending.id())
                .bind(JobStatus::Processing.id())
                .fetch_optional(pool)
                .await?;

            let Some(job) = flagged else {
                return match Self::find_by_id(pool, id).await? {
                    Some(job) => Err(StoreError::Conflict {
                        id: id.to_string(),
                        expected: JobStatus::Pending,
                        actual: JobStatus::from_id(job.status_id),
                    }),
                    None => Err(StoreError::NotFound {
                        entity: "Job",
                        id: id.to_string(),
                    }),
                };
            };

            if job.status() != Some(JobStatus::Pending) {
                return Ok(job);
            }
            match Self::transition(pool, id, JobStatus::Pending, JobStatus::Cancelled, None).await {
                Ok(job) => return Ok(job),
                // Claimed between the flag and the CAS; the worker will
                // see the flag. Re-read to return the current row.
                Err(StoreError::Conflict { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// List jobs in insertion order with optional status and age filters.
    pub async fn list(pool: &PgPool, params: &JobListQuery) -> Result<Vec<Job>, StoreError> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = params.offset.unwrap_or(0);

        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 1;

        if params.status_id.is_some() {
            conditions.push(format!("status_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.created_before.is_some() {
            conditions.push(format!("created_at < ${bind_idx}"));
            bind_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             {where_clause} \
             ORDER BY created_at ASC \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1,
        );

        let mut q = sqlx::query_as::<_, Job>(&query);
        if let Some(sid) = params.status_id {
            q = q.bind(sid);
        }
        if let Some(before) = params.created_before {
            q = q.bind(before);
        }
        q = q.bind(limit).bind(offset);

        Ok(q.fetch_all(pool).await?)
    }

    /// Delete a job and its usage rows. Idempotent; used only by the
    /// reaper and tests.
    pub async fn delete(pool: &PgPool, id: JobId) -> Result<bool, StoreError> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM usage WHERE job_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete all terminal jobs whose `completed_at` is older than the
    /// cutoff, together with their usage rows. Returns the removed ids.
    ///
    /// Safe to run concurrently with live processing: only rows already
    /// in a terminal state carry `completed_at`.
    pub async fn sweep(
        pool: &PgPool,
        cutoff: voicereel_core::types::Timestamp,
    ) -> Result<Vec<JobId>, StoreError> {
        let mut tx = pool.begin().await?;
        let stale: Vec<(JobId,)> = sqlx::query_as(
            "SELECT id FROM jobs \
             WHERE completed_at IS NOT NULL AND completed_at < $1 \
             FOR UPDATE SKIP LOCKED",
        )
        .bind(cutoff)
        .fetch_all(&mut *tx)
        .await?;
        let ids: Vec<JobId> = stale.into_iter().map(|(id,)| id).collect();
        if ids.is_empty() {
            return Ok(ids);
        }

        // Usage rows reference jobs, so they go first.
        sqlx::query("DELETE FROM usage WHERE job_id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM jobs WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(ids)
    }
}
