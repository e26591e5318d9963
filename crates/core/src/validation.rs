//! Type-specific schema checks for submission metadata.
//!
//! Submissions with invalid metadata are rejected before a job row is
//! ever created. Workers may rely on these invariants when reading the
//! metadata back.

use serde_json::Value;

use crate::error::CoreError;
use crate::job_type::JobType;

/// Allowed audio output formats for synthesis.
pub const OUTPUT_FORMATS: [&str; 2] = ["wav", "mp3"];

/// Allowed caption export formats for synthesis.
pub const CAPTION_FORMATS: [&str; 3] = ["json", "vtt", "srt"];

/// Maximum number of script segments in a single synthesis job.
const MAX_SCRIPT_SEGMENTS: usize = 500;

/// Maximum length of a speaker name.
const MAX_NAME_LEN: usize = 255;

/// Validate submission metadata against the job type's schema.
pub fn validate_submission(job_type: JobType, metadata: &Value) -> Result<(), CoreError> {
    let obj = metadata
        .as_object()
        .ok_or_else(|| CoreError::Validation("Metadata must be a JSON object".into()))?;

    match job_type {
        JobType::RegisterSpeaker => {
            let name = require_str(obj, "name")?;
            if name.len() > MAX_NAME_LEN {
                return Err(CoreError::Validation(format!(
                    "Speaker name must not exceed {MAX_NAME_LEN} characters"
                )));
            }
            validate_lang(require_str(obj, "lang")?)?;
            require_str(obj, "audio_path")?;
            require_str(obj, "script")?;
            Ok(())
        }
        JobType::Synthesize => {
            let script = obj
                .get("script")
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    CoreError::Validation("Field \"script\" must be an array of segments".into())
                })?;
            if script.is_empty() {
                return Err(CoreError::Validation(
                    "Field \"script\" must contain at least one segment".into(),
                ));
            }
            if script.len() > MAX_SCRIPT_SEGMENTS {
                return Err(CoreError::Validation(format!(
                    "Field \"script\" must not exceed {MAX_SCRIPT_SEGMENTS} segments"
                )));
            }
            for (i, segment) in script.iter().enumerate() {
                let seg = segment.as_object().ok_or_else(|| {
                    CoreError::Validation(format!("Script segment {i} must be an object"))
                })?;
                if !seg.get("speaker_id").is_some_and(|v| v.is_i64()) {
                    return Err(CoreError::Validation(format!(
                        "Script segment {i} is missing an integer \"speaker_id\""
                    )));
                }
                let text = seg.get("text").and_then(Value::as_str).ok_or_else(|| {
                    CoreError::Validation(format!(
                        "Script segment {i} is missing a string \"text\""
                    ))
                })?;
                if text.trim().is_empty() {
                    return Err(CoreError::Validation(format!(
                        "Script segment {i} has empty text"
                    )));
                }
            }
            validate_choice(obj, "output_format", &OUTPUT_FORMATS)?;
            validate_choice(obj, "caption_format", &CAPTION_FORMATS)?;
            if let Some(rate) = obj.get("sample_rate") {
                let rate = rate.as_u64().ok_or_else(|| {
                    CoreError::Validation("Field \"sample_rate\" must be a positive integer".into())
                })?;
                if !(8_000..=192_000).contains(&rate) {
                    return Err(CoreError::Validation(
                        "Field \"sample_rate\" must be between 8000 and 192000".into(),
                    ));
                }
            }
            Ok(())
        }
        // Enqueued by the interval scheduler only, never on client demand.
        JobType::Cleanup => Err(CoreError::Validation(
            "Job type \"cleanup\" is scheduled internally and cannot be submitted".into(),
        )),
    }
}

fn require_str<'a>(
    obj: &'a serde_json::Map<String, Value>,
    field: &str,
) -> Result<&'a str, CoreError> {
    let value = obj.get(field).and_then(Value::as_str).ok_or_else(|| {
        CoreError::Validation(format!("Missing required string field \"{field}\""))
    })?;
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!(
            "Field \"{field}\" must not be empty"
        )));
    }
    Ok(value)
}

/// ISO 639-1 language codes are two lowercase ASCII letters.
fn validate_lang(lang: &str) -> Result<(), CoreError> {
    if lang.len() == 2 && lang.chars().all(|c| c.is_ascii_lowercase()) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Field \"lang\" must be an ISO 639-1 code, got \"{lang}\""
        )))
    }
}

/// If `field` is present it must be one of `allowed`.
fn validate_choice(
    obj: &serde_json::Map<String, Value>,
    field: &str,
    allowed: &[&str],
) -> Result<(), CoreError> {
    if let Some(value) = obj.get(field) {
        let value = value.as_str().unwrap_or("");
        if !allowed.contains(&value) {
            return Err(CoreError::Validation(format!(
                "Field \"{field}\" must be one of {allowed:?}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_register_speaker_metadata() {
        let meta = json!({
            "name": "Narrator A",
            "lang": "en",
            "audio_path": "/refs/narrator_a.wav",
            "script": "The quick brown fox jumps over the lazy dog.",
        });
        assert!(validate_submission(JobType::RegisterSpeaker, &meta).is_ok());
    }

    #[test]
    fn register_speaker_rejects_bad_lang() {
        let meta = json!({
            "name": "Narrator A",
            "lang": "english",
            "audio_path": "/refs/a.wav",
            "script": "text",
        });
        assert!(validate_submission(JobType::RegisterSpeaker, &meta).is_err());
    }

    #[test]
    fn register_speaker_rejects_missing_audio_path() {
        let meta = json!({ "name": "A", "lang": "en", "script": "text" });
        assert!(validate_submission(JobType::RegisterSpeaker, &meta).is_err());
    }

    #[test]
    fn valid_synthesize_metadata() {
        let meta = json!({
            "script": [
                { "speaker_id": 1, "text": "Hello." },
                { "speaker_id": 2, "text": "Hi there." },
            ],
            "output_format": "wav",
            "caption_format": "vtt",
            "sample_rate": 48000,
        });
        assert!(validate_submission(JobType::Synthesize, &meta).is_ok());
    }

    #[test]
    fn synthesize_rejects_empty_script() {
        let meta = json!({ "script": [] });
        assert!(validate_submission(JobType::Synthesize, &meta).is_err());
    }

    #[test]
    fn synthesize_rejects_segment_without_speaker() {
        let meta = json!({ "script": [{ "text": "orphan line" }] });
        assert!(validate_submission(JobType::Synthesize, &meta).is_err());
    }

    #[test]
    fn synthesize_rejects_unknown_output_format() {
        let meta = json!({
            "script": [{ "speaker_id": 1, "text": "hi" }],
            "output_format": "flac",
        });
        assert!(validate_submission(JobType::Synthesize, &meta).is_err());
    }

    #[test]
    fn cleanup_is_never_client_submittable() {
        assert!(validate_submission(JobType::Cleanup, &json!({})).is_err());
        assert!(validate_submission(JobType::Cleanup, &json!({ "max_age_hours": 24 })).is_err());
    }

    #[test]
    fn metadata_must_be_object() {
        assert!(validate_submission(JobType::Synthesize, &json!([1, 2])).is_err());
    }
}
