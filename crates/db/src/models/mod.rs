pub mod job;
pub mod queue;
pub mod speaker;
pub mod status;
pub mod usage;
