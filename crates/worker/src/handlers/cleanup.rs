//! Artifact expiry: delete stored audio and captions past the
//! retention window.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use voicereel_engine::error::TaskError;
use voicereel_engine::registry::{TaskHandler, TaskOutcome};
use voicereel_engine::{BlobStorage, TaskContext};

pub struct CleanupHandler {
    storage: Arc<dyn BlobStorage>,
    default_max_age_hours: f64,
}

impl CleanupHandler {
    pub fn new(storage: Arc<dyn BlobStorage>, default_max_age_hours: f64) -> Self {
        Self {
            storage,
            default_max_age_hours,
        }
    }
}

#[async_trait]
impl TaskHandler for CleanupHandler {
    async fn run(
        &self,
        ctx: &TaskContext,
        metadata: &serde_json::Value,
    ) -> Result<TaskOutcome, TaskError> {
        let max_age_hours = metadata
            .get("max_age_hours")
            .and_then(|v| v.as_f64())
            .unwrap_or(self.default_max_age_hours);

        ctx.check_cancelled()?;

        let cutoff = Utc::now() - chrono::Duration::milliseconds((max_age_hours * 3_600_000.0) as i64);
        let removed = self.storage.delete_older_than(cutoff).await?;

        tracing::info!(job_id = %ctx.job_id, removed, max_age_hours, "Artifact cleanup done");

        Ok(TaskOutcome {
            patch: serde_json::json!({ "removed": removed }),
            usage: None,
        })
    }
}
