//! Handlers for the `/jobs` resource.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use voicereel_core::context::SubmissionContext;
use voicereel_core::job_type::JobType;
use voicereel_core::types::JobId;
use voicereel_core::validation::validate_submission;
use voicereel_db::models::job::JobListQuery;
use voicereel_db::repositories::JobRepo;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of a job submission.
#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    /// One of `register_speaker` or `synthesize`.
    pub job_type: String,
    /// Type-specific parameters, validated before the job is created.
    #[serde(default = "empty_object")]
    pub metadata: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

/// POST /api/v1/jobs
///
/// Validate and submit a new job. The job row and its broker message are
/// created in one transaction; returns 201 with the pending job.
pub async fn submit_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<SubmitJobRequest>,
) -> AppResult<impl IntoResponse> {
    let job_type = JobType::parse(&input.job_type)?;
    validate_submission(job_type, &input.metadata)?;

    let context = SubmissionContext {
        request_id: headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        api_key_id: None,
    };
    let metadata = context.apply_to(&input.metadata);

    let job = JobRepo::create_and_enqueue(&state.pool, job_type, &metadata).await?;

    tracing::info!(job_id = %job.id, job_type = %job_type, "Job submitted");

    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

/// GET /api/v1/jobs
///
/// List jobs in insertion order. Supports optional `status_id`,
/// `created_before`, `limit`, and `offset` query parameters.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let jobs = JobRepo::list(&state.pool, &params).await?;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = JobRepo::get(&state.pool, job_id).await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/jobs/{id}/cancel
///
/// Request cancellation. A pending job is cancelled outright; a
/// processing job gets its flag set and is cancelled at the worker's
/// next safe point. Returns the updated job, or 409 if it is already
/// terminal.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = JobRepo::request_cancel(&state.pool, job_id).await?;

    tracing::info!(job_id = %job.id, status = ?job.status(), "Cancellation requested");

    Ok(Json(DataResponse { data: job }))
}
