//! Narrow contracts on the external collaborators.

use async_trait::async_trait;
use voicereel_core::types::Timestamp;

use crate::error::TaskError;
use crate::types::{FeatureRequest, FeatureExtraction, SynthesisOutput, SynthesisRequest};

/// The opaque speech-synthesis/voice-modeling engine.
///
/// Implementations classify their own failures: a transient error
/// (engine busy, connection refused) drives retry with backoff, a fatal
/// one (malformed input) fails the job immediately.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    async fn extract_features(&self, req: FeatureRequest) -> Result<FeatureExtraction, TaskError>;

    async fn synthesize(&self, req: SynthesisRequest) -> Result<SynthesisOutput, TaskError>;
}

/// S3-style blob storage, reduced to what the handlers need: upload a
/// produced artifact under a key, and expire old artifacts.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Store a local file under `key`; returns the stored object's URL.
    async fn put_file(&self, key: &str, src_path: &str) -> Result<String, TaskError>;

    /// Store raw bytes (caption text) under `key`; returns the URL.
    async fn put_bytes(&self, key: &str, bytes: &[u8]) -> Result<String, TaskError>;

    /// Delete artifacts older than the cutoff; returns how many went.
    async fn delete_older_than(&self, cutoff: Timestamp) -> Result<u64, TaskError>;
}
