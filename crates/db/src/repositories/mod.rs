pub mod job_repo;
pub mod queue_repo;
pub mod speaker_repo;
pub mod usage_repo;

pub use job_repo::{JobRepo, UsageEntry};
pub use queue_repo::QueueRepo;
pub use speaker_repo::SpeakerRepo;
pub use usage_repo::UsageRepo;
