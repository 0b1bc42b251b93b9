//! Integration tests for `PgEventRepository`.
//!
//! These need a PostgreSQL instance; run them with
//! `DATABASE_URL=... cargo test -- --ignored`.

use chrono::Utc;
use rideshare_core::error::DomainError;
use rideshare_core::repository::{EventRepository, StoredEvent};
use rideshare_event_store::pg_event_repository::PgEventRepository;
use sqlx::PgPool;
use uuid::Uuid;

/// Helper to build a `StoredEvent` with sensible defaults.
fn make_stored_event(aggregate_id: Uuid, sequence_number: i64) -> StoredEvent {
    StoredEvent {
        event_id: Uuid::new_v4(),
        aggregate_id,
        event_type: "trip.started".to_string(),
        payload: serde_json::json!({"TripStarted": {"user_id": "u1"}}),
        sequence_number,
        correlation_id: Uuid::new_v4(),
        causation_id: Uuid::new_v4(),
        // Postgres stores microseconds; truncate so round-trips compare equal.
        occurred_at: chrono::DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap(),
    }
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_load_events_returns_empty_vec_for_nonexistent_aggregate(pool: PgPool) {
    let repo = PgEventRepository::new(pool);

    let events = repo.load_events(Uuid::new_v4()).await.unwrap();

    assert!(events.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_append_and_load_preserves_sequence_order(pool: PgPool) {
    let repo = PgEventRepository::new(pool);
    let aggregate_id = Uuid::new_v4();
    let events = vec![
        make_stored_event(aggregate_id, 1),
        make_stored_event(aggregate_id, 2),
        make_stored_event(aggregate_id, 3),
    ];

    repo.append_events(aggregate_id, 0, &events).await.unwrap();

    let loaded = repo.load_events(aggregate_id).await.unwrap();
    assert_eq!(loaded, events);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_append_with_stale_version_is_a_concurrency_conflict(pool: PgPool) {
    let repo = PgEventRepository::new(pool);
    let aggregate_id = Uuid::new_v4();
    repo.append_events(aggregate_id, 0, &[make_stored_event(aggregate_id, 1)])
        .await
        .unwrap();

    let result = repo
        .append_events(aggregate_id, 0, &[make_stored_event(aggregate_id, 1)])
        .await;

    match result {
        Err(DomainError::ConcurrencyConflict {
            expected, actual, ..
        }) => {
            assert_eq!(expected, 0);
            assert_eq!(actual, 1);
        }
        other => panic!("expected ConcurrencyConflict, got {other:?}"),
    }
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_streams_are_isolated_by_aggregate(pool: PgPool) {
    let repo = PgEventRepository::new(pool);
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();
    repo.append_events(first, 0, &[make_stored_event(first, 1)])
        .await
        .unwrap();
    repo.append_events(second, 0, &[make_stored_event(second, 1)])
        .await
        .unwrap();

    let loaded = repo.load_events(first).await.unwrap();

    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].aggregate_id, first);
}
