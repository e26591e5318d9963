//! Integration tests for the Postgres-backed queue broker: leases,
//! redelivery, dead-lettering, and the submit-time enqueue.

use std::time::Duration;

use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use voicereel_core::job_type::JobType;
use voicereel_db::models::queue::NackOutcome;
use voicereel_db::repositories::{JobRepo, QueueRepo};

const LEASE: Duration = Duration::from_secs(60);
const MAX_DELIVERIES: i32 = 5;

#[sqlx::test(migrations = "./migrations")]
async fn dequeue_empty_queue_returns_none(pool: PgPool) {
    let lease = QueueRepo::dequeue(&pool, "synthesize", LEASE).await.unwrap();
    assert!(lease.is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn enqueue_then_dequeue_grants_lease(pool: PgPool) {
    let job_id = Uuid::new_v4();
    QueueRepo::enqueue(&pool, "synthesize", job_id, &json!({ "k": 1 }))
        .await
        .unwrap();
    assert_eq!(QueueRepo::depth(&pool, "synthesize").await.unwrap(), 1);

    let lease = QueueRepo::dequeue(&pool, "synthesize", LEASE)
        .await
        .unwrap()
        .expect("message should be claimable");

    assert_eq!(lease.job_id, job_id);
    assert_eq!(lease.queue, "synthesize");
    assert_eq!(lease.delivery_count, 1);
    assert_eq!(lease.payload["k"], 1);

    // Leased message is invisible: no backlog, no second claim.
    assert_eq!(QueueRepo::depth(&pool, "synthesize").await.unwrap(), 0);
    assert!(QueueRepo::dequeue(&pool, "synthesize", LEASE)
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn queues_are_isolated(pool: PgPool) {
    QueueRepo::enqueue(&pool, "register_speaker", Uuid::new_v4(), &json!({}))
        .await
        .unwrap();
    assert!(QueueRepo::dequeue(&pool, "synthesize", LEASE)
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn ack_removes_message_permanently(pool: PgPool) {
    QueueRepo::enqueue(&pool, "cleanup", Uuid::new_v4(), &json!({}))
        .await
        .unwrap();
    let lease = QueueRepo::dequeue(&pool, "cleanup", LEASE)
        .await
        .unwrap()
        .unwrap();

    assert!(QueueRepo::ack(&pool, &lease).await.unwrap());
    // Second ack is a no-op.
    assert!(!QueueRepo::ack(&pool, &lease).await.unwrap());
    assert!(QueueRepo::dequeue(&pool, "cleanup", LEASE)
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn expired_lease_redelivers_and_invalidates_old_token(pool: PgPool) {
    QueueRepo::enqueue(&pool, "synthesize", Uuid::new_v4(), &json!({}))
        .await
        .unwrap();

    // Zero-length lease: the message is immediately claimable again.
    let first = QueueRepo::dequeue(&pool, "synthesize", Duration::ZERO)
        .await
        .unwrap()
        .unwrap();
    let second = QueueRepo::dequeue(&pool, "synthesize", LEASE)
        .await
        .unwrap()
        .expect("expired lease should redeliver");

    assert_eq!(second.message_id, first.message_id);
    assert_eq!(second.delivery_count, 2);

    // The stale holder can no longer ack.
    assert!(!QueueRepo::ack(&pool, &first).await.unwrap());
    assert!(QueueRepo::ack(&pool, &second).await.unwrap());
}

#[sqlx::test(migrations = "./migrations")]
async fn nack_requeues_with_delay(pool: PgPool) {
    QueueRepo::enqueue(&pool, "synthesize", Uuid::new_v4(), &json!({}))
        .await
        .unwrap();
    let lease = QueueRepo::dequeue(&pool, "synthesize", LEASE)
        .await
        .unwrap()
        .unwrap();

    // A long requeue delay keeps the message invisible.
    let outcome = QueueRepo::nack(&pool, &lease, Duration::from_secs(300), MAX_DELIVERIES, None)
        .await
        .unwrap();
    assert_eq!(outcome, NackOutcome::Requeued);
    assert!(QueueRepo::dequeue(&pool, "synthesize", LEASE)
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn nack_with_zero_delay_is_immediately_claimable(pool: PgPool) {
    QueueRepo::enqueue(&pool, "synthesize", Uuid::new_v4(), &json!({}))
        .await
        .unwrap();
    let lease = QueueRepo::dequeue(&pool, "synthesize", LEASE)
        .await
        .unwrap()
        .unwrap();

    QueueRepo::nack(&pool, &lease, Duration::ZERO, MAX_DELIVERIES, None)
        .await
        .unwrap();
    let redelivered = QueueRepo::dequeue(&pool, "synthesize", LEASE)
        .await
        .unwrap()
        .expect("nacked message should come back");
    assert_eq!(redelivered.delivery_count, 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn exhausted_deliveries_route_to_dead_letter(pool: PgPool) {
    let job_id = Uuid::new_v4();
    QueueRepo::enqueue(&pool, "synthesize", job_id, &json!({}))
        .await
        .unwrap();

    // Budget of 2 deliveries: the second nack dead-letters.
    let first = QueueRepo::dequeue(&pool, "synthesize", LEASE)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        QueueRepo::nack(&pool, &first, Duration::ZERO, 2, None)
            .await
            .unwrap(),
        NackOutcome::Requeued
    );

    let second = QueueRepo::dequeue(&pool, "synthesize", LEASE)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.delivery_count, 2);
    assert_eq!(
        QueueRepo::nack(&pool, &second, Duration::ZERO, 2, Some("handler kept failing"))
            .await
            .unwrap(),
        NackOutcome::DeadLettered
    );

    // Gone from the queue, present in dead_letters.
    assert!(QueueRepo::dequeue(&pool, "synthesize", LEASE)
        .await
        .unwrap()
        .is_none());
    let dead = QueueRepo::dead_letters(&pool, "synthesize").await.unwrap();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].job_id, job_id);
    assert_eq!(dead[0].delivery_count, 2);
    assert_eq!(dead[0].reason.as_deref(), Some("handler kept failing"));
}

#[sqlx::test(migrations = "./migrations")]
async fn create_and_enqueue_routes_by_job_type(pool: PgPool) {
    let job = JobRepo::create_and_enqueue(&pool, JobType::RegisterSpeaker, &json!({}))
        .await
        .unwrap();

    let lease = QueueRepo::dequeue(&pool, "register_speaker", LEASE)
        .await
        .unwrap()
        .expect("submission should have enqueued a message");
    assert_eq!(lease.job_id, job.id);
}
