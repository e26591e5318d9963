//! Handlers for the read-only `/speakers` resource. Speakers are
//! created by the registration worker, never through this API.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use voicereel_core::types::DbId;
use voicereel_db::models::speaker::SpeakerListQuery;
use voicereel_db::repositories::SpeakerRepo;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/speakers
///
/// List speaker profiles, newest first. Supports `limit` and `offset`.
pub async fn list_speakers(
    State(state): State<AppState>,
    Query(params): Query<SpeakerListQuery>,
) -> AppResult<impl IntoResponse> {
    let speakers = SpeakerRepo::list(&state.pool, &params).await?;
    Ok(Json(DataResponse { data: speakers }))
}

/// GET /api/v1/speakers/{id}
pub async fn get_speaker(
    State(state): State<AppState>,
    Path(speaker_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let speaker = SpeakerRepo::get(&state.pool, speaker_id).await?;
    Ok(Json(DataResponse { data: speaker }))
}
