//! Route definitions for the `/speakers` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::speakers;
use crate::state::AppState;

/// Routes mounted at `/speakers`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(speakers::list_speakers))
        .route("/{id}", get(speakers::get_speaker))
}
