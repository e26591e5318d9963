//! Job handlers and the registry wiring them to queues.

pub mod cleanup;
pub mod register_speaker;
pub mod synthesize;

use std::sync::Arc;

use sqlx::PgPool;
use voicereel_core::job_type::JobType;
use voicereel_engine::{BlobStorage, HandlerRegistry, SpeechEngine};

use crate::config::WorkerConfig;

/// Build the production handler registry.
pub fn build_registry(
    pool: PgPool,
    engine: Arc<dyn SpeechEngine>,
    storage: Arc<dyn BlobStorage>,
    config: &WorkerConfig,
) -> HandlerRegistry {
    HandlerRegistry::new()
        .with_handler(
            JobType::RegisterSpeaker,
            Arc::new(register_speaker::RegisterSpeakerHandler::new(
                pool.clone(),
                Arc::clone(&engine),
            )),
        )
        .with_handler(
            JobType::Synthesize,
            Arc::new(synthesize::SynthesizeHandler::new(
                pool,
                engine,
                Arc::clone(&storage),
            )),
        )
        .with_handler(
            JobType::Cleanup,
            Arc::new(cleanup::CleanupHandler::new(storage, config.max_age_hours)),
        )
}

/// Missing or mistyped metadata field. Submission validation should
/// have caught it, so this surfaces as a fatal `INVALID_INPUT`.
fn require_str<'a>(
    metadata: &'a serde_json::Value,
    field: &str,
) -> Result<&'a str, voicereel_engine::TaskError> {
    metadata.get(field).and_then(|v| v.as_str()).ok_or_else(|| {
        voicereel_engine::TaskError::fatal(
            voicereel_engine::error::codes::INVALID_INPUT,
            format!("metadata field \"{field}\" is missing or not a string"),
        )
    })
}
