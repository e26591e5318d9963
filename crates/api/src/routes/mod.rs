pub mod health;
pub mod jobs;
pub mod speakers;
pub mod usage;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /jobs                 list, submit (GET, POST)
/// /jobs/{id}            get job (GET)
/// /jobs/{id}/cancel     request cancellation (POST)
///
/// /speakers             list speakers (GET)
/// /speakers/{id}        get speaker (GET)
///
/// /usage/stats          monthly usage stats (GET, ?year=&month=)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/jobs", jobs::router())
        .nest("/speakers", speakers::router())
        .nest("/usage", usage::router())
}
