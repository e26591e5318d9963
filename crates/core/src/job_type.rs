//! Job kinds and their queue routing.
//!
//! Queue names map 1:1 to job types. `cleanup` jobs are enqueued by the
//! worker's interval scheduler rather than by clients, but travel through
//! the same broker machinery.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Enumerated kind of asynchronous work, fixed at job creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    RegisterSpeaker,
    Synthesize,
    Cleanup,
}

impl JobType {
    /// All job types, in a stable order.
    pub const ALL: [JobType; 3] = [
        JobType::RegisterSpeaker,
        JobType::Synthesize,
        JobType::Cleanup,
    ];

    /// Stable string form, stored in the `jobs.job_type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::RegisterSpeaker => "register_speaker",
            JobType::Synthesize => "synthesize",
            JobType::Cleanup => "cleanup",
        }
    }

    /// Parse the stored string form.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "register_speaker" => Ok(JobType::RegisterSpeaker),
            "synthesize" => Ok(JobType::Synthesize),
            "cleanup" => Ok(JobType::Cleanup),
            other => Err(CoreError::Validation(format!(
                "Unknown job type: \"{other}\""
            ))),
        }
    }

    /// Name of the broker queue this job type is dispatched on.
    pub fn queue_name(self) -> &'static str {
        match self {
            JobType::RegisterSpeaker => "register_speaker",
            JobType::Synthesize => "synthesize",
            JobType::Cleanup => "cleanup",
        }
    }

    /// Default retry budget per type. Cleanup is re-enqueued by the
    /// scheduler anyway, so it gets a single attempt.
    pub fn default_max_attempts(self) -> i32 {
        match self {
            JobType::RegisterSpeaker => 3,
            JobType::Synthesize => 3,
            JobType::Cleanup => 1,
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
