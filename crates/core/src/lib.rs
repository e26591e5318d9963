//! Pure domain logic for the VoiceReel job orchestration core.
//!
//! This crate has no internal dependencies and no I/O. It defines the
//! shared ID/timestamp types, the domain error taxonomy, job types and
//! their queue routing, the retry/backoff policy, submission metadata
//! validation, and the request-scoped submission context.

pub mod context;
pub mod error;
pub mod job_type;
pub mod retry;
pub mod types;
pub mod validation;
