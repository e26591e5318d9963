//! Handlers for the `/usage` statistics endpoint.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{Datelike, Utc};
use serde::Deserialize;
use voicereel_core::error::CoreError;
use voicereel_db::repositories::UsageRepo;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for usage stats. Both default to the current month.
#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

/// GET /api/v1/usage/stats
///
/// Monthly usage aggregate with a per-day breakdown. Reading stats has
/// no side effects; the ledger is written only by workers.
pub async fn usage_stats(
    State(state): State<AppState>,
    Query(params): Query<StatsQuery>,
) -> AppResult<impl IntoResponse> {
    let now = Utc::now();
    let year = params.year.unwrap_or_else(|| now.year());
    let month = params.month.unwrap_or_else(|| now.month());

    if !(1..=12).contains(&month) {
        return Err(
            CoreError::Validation(format!("Month must be between 1 and 12, got {month}")).into(),
        );
    }

    let stats = UsageRepo::stats(&state.pool, year, month).await?;
    Ok(Json(DataResponse { data: stats }))
}
