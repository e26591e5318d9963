//! Speaker entity model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use voicereel_core::types::{DbId, Timestamp};

/// A registered voice profile. Immutable after creation; re-registering
/// a voice creates a new speaker row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Speaker {
    pub id: DbId,
    pub name: String,
    pub lang: String,
    /// Voice embedding reference (e.g. `feature_path`), not the raw
    /// embedding itself.
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
}

/// Query parameters for `GET /api/v1/speakers`.
#[derive(Debug, Default, Deserialize)]
pub struct SpeakerListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
