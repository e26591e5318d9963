//! Multi-speaker synthesis: resolve speakers, call the engine, store
//! the produced audio and captions.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use voicereel_db::repositories::SpeakerRepo;
use voicereel_engine::error::{codes, TaskError};
use voicereel_engine::registry::{TaskHandler, TaskOutcome, UsageAmount};
use voicereel_engine::types::{SynthesisRequest, SynthesisSegment};
use voicereel_engine::{BlobStorage, SpeechEngine, TaskContext};

const DEFAULT_OUTPUT_FORMAT: &str = "wav";
const DEFAULT_CAPTION_FORMAT: &str = "json";
const DEFAULT_SAMPLE_RATE: u32 = 48_000;

pub struct SynthesizeHandler {
    pool: PgPool,
    engine: Arc<dyn SpeechEngine>,
    storage: Arc<dyn BlobStorage>,
}

impl SynthesizeHandler {
    pub fn new(
        pool: PgPool,
        engine: Arc<dyn SpeechEngine>,
        storage: Arc<dyn BlobStorage>,
    ) -> Self {
        Self {
            pool,
            engine,
            storage,
        }
    }

    /// Resolve each script line's speaker to its stored voice print.
    async fn resolve_segments(
        &self,
        metadata: &serde_json::Value,
    ) -> Result<Vec<SynthesisSegment>, TaskError> {
        let script = metadata
            .get("script")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                TaskError::fatal(codes::INVALID_INPUT, "metadata field \"script\" is missing")
            })?;

        let mut segments = Vec::with_capacity(script.len());
        for line in script {
            let speaker_id = line
                .get("speaker_id")
                .and_then(|v| v.as_i64())
                .ok_or_else(|| {
                    TaskError::fatal(codes::INVALID_INPUT, "script segment without speaker_id")
                })?;
            let text = line.get("text").and_then(|v| v.as_str()).ok_or_else(|| {
                TaskError::fatal(codes::INVALID_INPUT, "script segment without text")
            })?;

            let speaker = SpeakerRepo::find_by_id(&self.pool, speaker_id)
                .await
                .map_err(|e| TaskError::transient(format!("speaker lookup failed: {e}")))?
                .ok_or_else(|| {
                    TaskError::fatal(
                        codes::SPEAKER_NOT_FOUND,
                        format!("speaker {speaker_id} does not exist"),
                    )
                })?;

            let feature_path = speaker
                .metadata
                .get("feature_path")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    TaskError::fatal(
                        codes::INVALID_INPUT,
                        format!("speaker {speaker_id} has no stored voice print"),
                    )
                })?;

            segments.push(SynthesisSegment {
                speaker_id,
                feature_path: feature_path.to_string(),
                text: text.to_string(),
            });
        }
        Ok(segments)
    }
}

#[async_trait]
impl TaskHandler for SynthesizeHandler {
    async fn run(
        &self,
        ctx: &TaskContext,
        metadata: &serde_json::Value,
    ) -> Result<TaskOutcome, TaskError> {
        let segments = self.resolve_segments(metadata).await?;
        let num_segments = segments.len();
        ctx.check_cancelled()?;

        let output_format = metadata
            .get("output_format")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_OUTPUT_FORMAT)
            .to_string();
        let caption_format = metadata
            .get("caption_format")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_CAPTION_FORMAT)
            .to_string();
        let sample_rate = metadata
            .get("sample_rate")
            .and_then(|v| v.as_u64())
            .map(|r| r as u32)
            .unwrap_or(DEFAULT_SAMPLE_RATE);

        let output = self
            .engine
            .synthesize(SynthesisRequest {
                segments,
                output_format: output_format.clone(),
                sample_rate,
                caption_format: caption_format.clone(),
            })
            .await?;

        ctx.check_cancelled()?;

        let audio_url = self
            .storage
            .put_file(
                &format!("audio/{}.{output_format}", ctx.job_id),
                &output.audio_path,
            )
            .await?;
        let caption_url = self
            .storage
            .put_bytes(
                &format!("captions/{}.{caption_format}", ctx.job_id),
                output.captions.as_bytes(),
            )
            .await?;

        tracing::info!(
            job_id = %ctx.job_id,
            duration = output.duration,
            "Synthesis complete"
        );

        Ok(TaskOutcome {
            patch: serde_json::json!({
                "audio_url": audio_url,
                "caption_url": caption_url,
                "duration": output.duration,
                "num_segments": num_segments,
            }),
            usage: Some(UsageAmount {
                length: output.duration,
                speaker_id: None,
            }),
        })
    }
}
