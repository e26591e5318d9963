//! HTTP client for the speech-engine sidecar.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{codes, TaskError};
use crate::traits::SpeechEngine;
use crate::types::{FeatureRequest, FeatureExtraction, SynthesisOutput, SynthesisRequest};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Talks to the engine sidecar over plain JSON-over-HTTP.
///
/// Error classification: anything at the transport layer (refused
/// connection, reset, timeout) and 5xx responses are transient; 4xx
/// responses mean the engine rejected the request itself, which no
/// retry will fix.
#[derive(Debug, Clone)]
pub struct HttpSpeechEngine {
    http: reqwest::Client,
    base_url: String,
}

impl HttpSpeechEngine {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, TaskError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url.trim_end_matches('/'));

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|err| TaskError::transient(format!("engine unreachable: {err}")))?;

        let status = response.status();
        if status.is_client_error() {
            let detail = response.text().await.unwrap_or_default();
            return Err(TaskError::fatal(
                codes::ENGINE_REJECTED,
                format!("engine rejected request ({status}): {detail}"),
            ));
        }
        if !status.is_success() {
            return Err(TaskError::transient(format!(
                "engine error response: {status}"
            )));
        }

        response
            .json::<R>()
            .await
            .map_err(|err| TaskError::transient(format!("malformed engine response: {err}")))
    }
}

#[async_trait]
impl SpeechEngine for HttpSpeechEngine {
    async fn extract_features(&self, req: FeatureRequest) -> Result<FeatureExtraction, TaskError> {
        tracing::debug!(audio_path = %req.audio_path, lang = %req.lang, "extracting voice features");
        self.post("/v1/features", &req).await
    }

    async fn synthesize(&self, req: SynthesisRequest) -> Result<SynthesisOutput, TaskError> {
        tracing::debug!(
            segments = req.segments.len(),
            format = %req.output_format,
            "synthesizing audio"
        );
        self.post("/v1/synthesize", &req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_engine_is_transient() {
        // Port 1 on loopback refuses the connection immediately.
        let engine = HttpSpeechEngine::new("http://127.0.0.1:1");
        let err = engine
            .extract_features(FeatureRequest {
                audio_path: "/tmp/ref.wav".into(),
                script: "hello".into(),
                lang: "en".into(),
            })
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn base_url_trailing_slash_is_tolerated() {
        let engine = HttpSpeechEngine::new("http://engine:9000/");
        assert_eq!(engine.base_url, "http://engine:9000/");
        // post() trims before joining; just confirm construction works.
        let trimmed = engine.base_url.trim_end_matches('/');
        assert_eq!(format!("{trimmed}/v1/features"), "http://engine:9000/v1/features");
    }
}
