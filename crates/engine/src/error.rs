//! Task error taxonomy.
//!
//! Handlers (and the collaborators they call) classify their own
//! failures: transient errors drive retry with backoff, fatal errors
//! fail the job immediately. Unclassified errors default to fatal.

/// Stable error codes exposed in a failed job's metadata.
pub mod codes {
    /// Hard time limit aborted the handler invocation.
    pub const TIMEOUT: &str = "TIMEOUT";
    /// The retry budget was spent on transient failures.
    pub const RETRIES_EXHAUSTED: &str = "RETRIES_EXHAUSTED";
    /// A synthesis segment referenced an unknown speaker.
    pub const SPEAKER_NOT_FOUND: &str = "SPEAKER_NOT_FOUND";
    /// The engine rejected the input as malformed.
    pub const ENGINE_REJECTED: &str = "ENGINE_REJECTED";
    /// Job metadata was missing a field the handler requires.
    pub const INVALID_INPUT: &str = "INVALID_INPUT";
    /// Cancellation was observed at a safe point.
    pub const CANCELLED: &str = "CANCELLED";
    /// Catch-all for unclassified failures.
    pub const INTERNAL: &str = "INTERNAL";
}

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Recoverable (e.g. engine temporarily unreachable); the job is
    /// requeued with backoff until its attempt budget runs out.
    #[error("transient task error: {0}")]
    Transient(String),

    /// Non-recoverable; the job fails immediately with this code and
    /// detail in its metadata.
    #[error("fatal task error [{code}]: {message}")]
    Fatal { code: String, message: String },

    /// The cancellation flag was observed at a safe point.
    #[error("task cancelled")]
    Cancelled,
}

impl TaskError {
    pub fn transient(message: impl Into<String>) -> Self {
        TaskError::Transient(message.into())
    }

    pub fn fatal(code: &str, message: impl Into<String>) -> Self {
        TaskError::Fatal {
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, TaskError::Transient(_))
    }

    /// The stable code recorded in job metadata for this error.
    pub fn code(&self) -> &str {
        match self {
            TaskError::Transient(_) => codes::INTERNAL,
            TaskError::Fatal { code, .. } => code,
            TaskError::Cancelled => codes::CANCELLED,
        }
    }
}
