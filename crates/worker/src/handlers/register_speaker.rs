//! Speaker registration: extract a voice print from reference audio and
//! persist the speaker profile.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use voicereel_db::repositories::SpeakerRepo;
use voicereel_engine::error::TaskError;
use voicereel_engine::registry::{TaskHandler, TaskOutcome, UsageAmount};
use voicereel_engine::types::FeatureRequest;
use voicereel_engine::{SpeechEngine, TaskContext};

use super::require_str;

pub struct RegisterSpeakerHandler {
    pool: PgPool,
    engine: Arc<dyn SpeechEngine>,
}

impl RegisterSpeakerHandler {
    pub fn new(pool: PgPool, engine: Arc<dyn SpeechEngine>) -> Self {
        Self { pool, engine }
    }
}

#[async_trait]
impl TaskHandler for RegisterSpeakerHandler {
    async fn run(
        &self,
        ctx: &TaskContext,
        metadata: &serde_json::Value,
    ) -> Result<TaskOutcome, TaskError> {
        let name = require_str(metadata, "name")?;
        let lang = require_str(metadata, "lang")?;
        let audio_path = require_str(metadata, "audio_path")?;
        let script = require_str(metadata, "script")?;

        ctx.check_cancelled()?;

        let extraction = self
            .engine
            .extract_features(FeatureRequest {
                audio_path: audio_path.to_string(),
                script: script.to_string(),
                lang: lang.to_string(),
            })
            .await?;

        // Past this point the voice print exists; finish the profile
        // even if cancellation arrived during extraction, so the stored
        // feature file never becomes an orphan.
        let speaker_meta = serde_json::json!({
            "feature_path": extraction.feature_path,
            "source_job_id": ctx.job_id,
        });
        let speaker = SpeakerRepo::create(&self.pool, name, lang, &speaker_meta)
            .await
            .map_err(|e| TaskError::transient(format!("speaker insert failed: {e}")))?;

        tracing::info!(
            job_id = %ctx.job_id,
            speaker_id = speaker.id,
            duration = extraction.audio_duration,
            "Speaker registered"
        );

        Ok(TaskOutcome {
            patch: serde_json::json!({
                "speaker_id": speaker.id,
                "feature_path": extraction.feature_path,
            }),
            usage: Some(UsageAmount {
                length: extraction.audio_duration,
                speaker_id: Some(speaker.id),
            }),
        })
    }
}
