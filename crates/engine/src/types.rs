//! Request/response shapes for the speech engine contract.

use serde::{Deserialize, Serialize};
use voicereel_core::types::DbId;

/// Input to voice-print extraction from reference audio.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureRequest {
    /// Path to the reference audio, reachable by the engine.
    pub audio_path: String,
    /// Transcript of the reference audio.
    pub script: String,
    /// ISO 639-1 language code.
    pub lang: String,
}

/// Result of voice-print extraction. The engine persists the embedding
/// itself and hands back a reference, never the raw tensor.
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureExtraction {
    pub feature_path: String,
    /// Seconds of reference audio analysed.
    pub audio_duration: f64,
}

/// One line of a multi-speaker synthesis script, with the speaker's
/// voice-print reference already resolved.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisSegment {
    pub speaker_id: DbId,
    pub feature_path: String,
    pub text: String,
}

/// Input to multi-speaker synthesis.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisRequest {
    pub segments: Vec<SynthesisSegment>,
    pub output_format: String,
    pub sample_rate: u32,
    pub caption_format: String,
}

/// Result of a synthesis run. The engine writes the audio to a path
/// shared with the worker; captions come back inline.
#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisOutput {
    pub audio_path: String,
    pub captions: String,
    /// Seconds of audio produced.
    pub duration: f64,
}
