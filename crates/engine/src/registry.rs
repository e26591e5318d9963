//! Job-type to handler mapping, injected at worker pool construction.
//!
//! An explicit registry instead of globally registered callables: the
//! composition root decides exactly which handlers exist, and tests can
//! swap in stubs without touching process-wide state.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use voicereel_core::job_type::JobType;
use voicereel_core::types::DbId;

use crate::context::TaskContext;
use crate::error::TaskError;

/// Usage figures produced by a successful task, recorded in the ledger
/// atomically with the `succeeded` transition.
#[derive(Debug, Clone, Copy)]
pub struct UsageAmount {
    /// Seconds of audio produced.
    pub length: f64,
    pub speaker_id: Option<DbId>,
}

/// What a successful handler invocation yields.
#[derive(Debug, Clone, Default)]
pub struct TaskOutcome {
    /// Merged by key into the job's metadata.
    pub patch: serde_json::Value,
    pub usage: Option<UsageAmount>,
}

/// One job type's execution logic.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn run(
        &self,
        ctx: &TaskContext,
        metadata: &serde_json::Value,
    ) -> Result<TaskOutcome, TaskError>;
}

/// Immutable job-type to handler map.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<JobType, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, job_type: JobType, handler: Arc<dyn TaskHandler>) -> Self {
        self.handlers.insert(job_type, handler);
        self
    }

    pub fn get(&self, job_type: JobType) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(&job_type).cloned()
    }

    /// Job types this registry can execute.
    pub fn job_types(&self) -> impl Iterator<Item = JobType> + '_ {
        self.handlers.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    struct Echo;

    #[async_trait]
    impl TaskHandler for Echo {
        async fn run(
            &self,
            _ctx: &TaskContext,
            metadata: &serde_json::Value,
        ) -> Result<TaskOutcome, TaskError> {
            Ok(TaskOutcome {
                patch: metadata.clone(),
                usage: None,
            })
        }
    }

    #[tokio::test]
    async fn lookup_and_invoke() {
        let registry =
            HandlerRegistry::new().with_handler(JobType::Synthesize, Arc::new(Echo));

        assert!(registry.get(JobType::Cleanup).is_none());

        let handler = registry.get(JobType::Synthesize).unwrap();
        let ctx = TaskContext::new(Uuid::new_v4(), 1, CancellationToken::new());
        let outcome = handler
            .run(&ctx, &serde_json::json!({ "x": 1 }))
            .await
            .unwrap();
        assert_eq!(outcome.patch["x"], 1);
    }
}
