//! The collaborator seam between the worker pool and the external
//! speech-synthesis engine.
//!
//! The engine itself is an opaque long-running service; this crate
//! defines the narrow contracts the orchestration core needs from it
//! ([`SpeechEngine`], [`BlobStorage`]), the transient/fatal task error
//! taxonomy, the per-invocation [`TaskContext`], and the job-type to
//! handler [`HandlerRegistry`] injected into the worker pool.

pub mod client;
pub mod context;
pub mod error;
pub mod registry;
pub mod storage;
pub mod traits;
pub mod types;

pub use context::TaskContext;
pub use error::TaskError;
pub use registry::{HandlerRegistry, TaskHandler, TaskOutcome, UsageAmount};
pub use traits::{BlobStorage, SpeechEngine};
