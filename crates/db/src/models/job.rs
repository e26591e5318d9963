//! Job entity model and listing query parameters.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use voicereel_core::job_type::JobType;
use voicereel_core::types::{JobId, Timestamp};

use super::status::{JobStatus, StatusId};

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: JobId,
    pub job_type: String,
    pub status_id: StatusId,
    pub attempt_count: i32,
    pub cancel_requested: bool,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl Job {
    /// Decode the stored status ID. `None` only if the row predates the
    /// current status set, which migrations rule out.
    pub fn status(&self) -> Option<JobStatus> {
        JobStatus::from_id(self.status_id)
    }

    /// Decode the stored job type string.
    pub fn job_type(&self) -> Result<JobType, voicereel_core::error::CoreError> {
        JobType::parse(&self.job_type)
    }
}

/// Filters for `JobRepo::list`.
#[derive(Debug, Default, Deserialize)]
pub struct JobListQuery {
    /// Filter by status ID (e.g. 1 = pending, 4 = failed).
    pub status_id: Option<StatusId>,
    /// Only jobs created strictly before this instant.
    pub created_before: Option<Timestamp>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}
