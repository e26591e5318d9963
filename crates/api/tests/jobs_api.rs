//! Integration tests for the `/jobs` resource: submission, retrieval,
//! listing, and cancellation.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, post, post_json};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use voicereel_core::job_type::JobType;
use voicereel_db::models::status::JobStatus;
use voicereel_db::repositories::{JobRepo, QueueRepo};

fn register_body() -> serde_json::Value {
    json!({
        "job_type": "register_speaker",
        "metadata": {
            "name": "Narrator A",
            "lang": "en",
            "audio_path": "/refs/narrator_a.wav",
            "script": "The quick brown fox jumps over the lazy dog.",
        },
    })
}

#[sqlx::test(migrations = "../db/migrations")]
async fn submit_creates_pending_job_and_enqueues(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let response = post_json(app, "/api/v1/jobs", register_body()).await;

    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    let job = &json["data"];
    assert_eq!(job["status_id"], JobStatus::Pending.id());
    assert_eq!(job["attempt_count"], 0);
    assert_eq!(job["metadata"]["name"], "Narrator A");
    // The request ID middleware stamps the submission context.
    assert!(job["metadata"]["submission"]["request_id"].is_string());

    assert_eq!(
        QueueRepo::depth(&pool, "register_speaker").await.unwrap(),
        1
    );
}

#[sqlx::test(migrations = "../db/migrations")]
async fn submit_unknown_job_type_is_rejected(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let response = post_json(
        app,
        "/api/v1/jobs",
        json!({ "job_type": "transcribe", "metadata": {} }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn submit_cleanup_job_is_rejected(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    // Cleanup jobs come from the worker's interval scheduler only.
    let response = post_json(
        app,
        "/api/v1/jobs",
        json!({ "job_type": "cleanup", "metadata": {} }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");

    let jobs = JobRepo::list(&pool, &Default::default()).await.unwrap();
    assert!(jobs.is_empty());
    assert_eq!(QueueRepo::depth(&pool, "cleanup").await.unwrap(), 0);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn submit_invalid_metadata_creates_nothing(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    // Missing audio_path.
    let response = post_json(
        app,
        "/api/v1/jobs",
        json!({
            "job_type": "register_speaker",
            "metadata": { "name": "A", "lang": "en", "script": "text" },
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");

    // Rejected before any row or message was created.
    let jobs = JobRepo::list(&pool, &Default::default()).await.unwrap();
    assert!(jobs.is_empty());
    assert_eq!(
        QueueRepo::depth(&pool, "register_speaker").await.unwrap(),
        0
    );
}

#[sqlx::test(migrations = "../db/migrations")]
async fn get_job_returns_the_row(pool: PgPool) {
    let job = JobRepo::create(&pool, JobType::Synthesize, &json!({ "script": [] }))
        .await
        .unwrap();

    let app = common::build_test_app(pool);
    let response = get(app, &format!("/api/v1/jobs/{}", job.id)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["id"], job.id.to_string());
    assert_eq!(json["data"]["job_type"], "synthesize");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn get_unknown_job_returns_404(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app, &format!("/api/v1/jobs/{}", Uuid::new_v4())).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn list_jobs_filters_by_status(pool: PgPool) {
    let first = JobRepo::create(&pool, JobType::RegisterSpeaker, &json!({}))
        .await
        .unwrap();
    let second = JobRepo::create(&pool, JobType::Synthesize, &json!({}))
        .await
        .unwrap();
    // Move the second job out of pending.
    JobRepo::transition(
        &pool,
        second.id,
        JobStatus::Pending,
        JobStatus::Processing,
        None,
    )
    .await
    .unwrap();

    let app = common::build_test_app(pool);

    let response = get(app.clone(), "/api/v1/jobs").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);
    // Insertion order.
    assert_eq!(json["data"][0]["id"], first.id.to_string());

    let response = get(
        app,
        &format!("/api/v1/jobs?status_id={}", JobStatus::Pending.id()),
    )
    .await;
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"][0]["id"], first.id.to_string());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn cancel_pending_job_is_immediate(pool: PgPool) {
    let job = JobRepo::create(&pool, JobType::RegisterSpeaker, &json!({}))
        .await
        .unwrap();

    let app = common::build_test_app(pool);
    let response = post(app.clone(), &format!("/api/v1/jobs/{}/cancel", job.id)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status_id"], JobStatus::Cancelled.id());
    assert!(!json["data"]["completed_at"].is_null());

    // A second cancel hits a terminal job.
    let response = post(app, &format!("/api/v1/jobs/{}/cancel", job.id)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "CONFLICT");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn cancel_processing_job_only_sets_the_flag(pool: PgPool) {
    let job = JobRepo::create(&pool, JobType::Synthesize, &json!({}))
        .await
        .unwrap();
    JobRepo::transition(&pool, job.id, JobStatus::Pending, JobStatus::Processing, None)
        .await
        .unwrap();

    let app = common::build_test_app(pool);
    let response = post(app, &format!("/api/v1/jobs/{}/cancel", job.id)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status_id"], JobStatus::Processing.id());
    assert_eq!(json["data"]["cancel_requested"], true);
}
