//! Integration tests for the `/speakers` and `/usage` resources.

mod common;

use axum::http::StatusCode;
use chrono::{Datelike, Utc};
use common::{body_json, get};
use serde_json::json;
use sqlx::PgPool;
use voicereel_db::repositories::{SpeakerRepo, UsageRepo};

#[sqlx::test(migrations = "../db/migrations")]
async fn list_speakers_newest_first(pool: PgPool) {
    let meta = json!({ "feature_path": "/features/a.bin" });
    SpeakerRepo::create(&pool, "Narrator A", "en", &meta)
        .await
        .unwrap();
    let second = SpeakerRepo::create(&pool, "Narrator B", "ko", &meta)
        .await
        .unwrap();

    let app = common::build_test_app(pool);
    let response = get(app, "/api/v1/speakers").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let speakers = json["data"].as_array().unwrap();
    assert_eq!(speakers.len(), 2);
    assert_eq!(speakers[0]["id"], second.id);
    assert_eq!(speakers[0]["name"], "Narrator B");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn get_speaker_exposes_voice_print_reference(pool: PgPool) {
    let speaker = SpeakerRepo::create(
        &pool,
        "Narrator A",
        "en",
        &json!({ "feature_path": "/features/a.bin" }),
    )
    .await
    .unwrap();

    let app = common::build_test_app(pool);
    let response = get(app, &format!("/api/v1/speakers/{}", speaker.id)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["metadata"]["feature_path"], "/features/a.bin");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn get_unknown_speaker_returns_404(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app, "/api/v1/speakers/999").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn usage_stats_aggregate_the_current_month(pool: PgPool) {
    let speaker = SpeakerRepo::create(&pool, "A", "en", &json!({}))
        .await
        .unwrap();
    UsageRepo::record(&pool, 10.0, None, Some(speaker.id))
        .await
        .unwrap();
    UsageRepo::record(&pool, 2.5, None, Some(speaker.id))
        .await
        .unwrap();

    let now = Utc::now();
    let app = common::build_test_app(pool);
    let response = get(
        app,
        &format!("/api/v1/usage/stats?year={}&month={}", now.year(), now.month()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["count"], 2);
    assert_eq!(json["data"]["total_length"], 12.5);
    assert_eq!(json["data"]["unique_speakers"], 1);
    assert_eq!(json["data"]["daily"].as_array().unwrap().len(), 1);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn usage_stats_reject_invalid_month(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app, "/api/v1/usage/stats?year=2026&month=13").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}
