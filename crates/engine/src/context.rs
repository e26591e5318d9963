//! Per-invocation task context: identity, attempt number, and the
//! cooperative cancellation flag.

use tokio_util::sync::CancellationToken;
use voicereel_core::types::JobId;

use crate::error::TaskError;

/// Passed to every handler invocation. Cancellation is cooperative:
/// handlers check it at safe points between internally-chunked
/// sub-steps; a handler deep inside an uninterruptible engine call may
/// still run to completion.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub job_id: JobId,
    /// 1-based dispatch attempt this invocation belongs to.
    pub attempt: i32,
    cancel: CancellationToken,
}

impl TaskContext {
    pub fn new(job_id: JobId, attempt: i32, cancel: CancellationToken) -> Self {
        Self {
            job_id,
            attempt,
            cancel,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Safe-point check: returns `TaskError::Cancelled` once the flag
    /// is set.
    pub fn check_cancelled(&self) -> Result<(), TaskError> {
        if self.is_cancelled() {
            Err(TaskError::Cancelled)
        } else {
            Ok(())
        }
    }
}
