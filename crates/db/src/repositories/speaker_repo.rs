//! Repository for the `speakers` table.

use sqlx::PgPool;
use voicereel_core::types::DbId;

use crate::error::StoreError;
use crate::models::speaker::{Speaker, SpeakerListQuery};

const COLUMNS: &str = "id, name, lang, metadata, created_at";

const MAX_LIMIT: i64 = 100;
const DEFAULT_LIMIT: i64 = 10;

pub struct SpeakerRepo;

impl SpeakerRepo {
    /// Create a speaker profile. Called by the registration handler
    /// after feature extraction succeeds; never updated afterwards.
    pub async fn create(
        pool: &PgPool,
        name: &str,
        lang: &str,
        metadata: &serde_json::Value,
    ) -> Result<Speaker, StoreError> {
        let query = format!(
            "INSERT INTO speakers (name, lang, metadata) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        let speaker = sqlx::query_as::<_, Speaker>(&query)
            .bind(name)
            .bind(lang)
            .bind(metadata)
            .fetch_one(pool)
            .await?;
        Ok(speaker)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Speaker>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM speakers WHERE id = $1");
        let speaker = sqlx::query_as::<_, Speaker>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(speaker)
    }

    /// Like [`Self::find_by_id`] but maps absence to `NotFound`.
    pub async fn get(pool: &PgPool, id: DbId) -> Result<Speaker, StoreError> {
        Self::find_by_id(pool, id)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "Speaker",
                id: id.to_string(),
            })
    }

    /// List speakers, newest first.
    pub async fn list(
        pool: &PgPool,
        params: &SpeakerListQuery,
    ) -> Result<Vec<Speaker>, StoreError> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = params.offset.unwrap_or(0);
        let query = format!(
            "SELECT {COLUMNS} FROM speakers \
             ORDER BY created_at DESC \
             LIMIT $1 OFFSET $2"
        );
        let speakers = sqlx::query_as::<_, Speaker>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;
        Ok(speakers)
    }
}
