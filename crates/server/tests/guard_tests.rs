//! # Connection Guard Tests
//!
//! Breaker behavior against a real (reachable and unreachable) store. The
//! pure state machine has its own unit tests; these cover the wiring.

mod common;

use std::time::{Duration, Instant};

use common::{setup_state, unreachable_state};
use server::connection::BreakerState;

#[tokio::test]
async fn test_healthy_store_reports_closed() {
    let state = setup_state().await;

    let health = state.health();
    assert_eq!(health.state, BreakerState::Closed);
    assert_eq!(health.failure_count, 0);
    assert!(health.healthy);
    assert!(health.last_success_at.is_some());
    assert!(health.retry_in_secs.is_none());
}

#[tokio::test]
async fn test_breaker_opens_after_threshold_failures() {
    let state = unreachable_state();

    for _ in 0 .. 5 {
        let err = state.guard.acquire().await.unwrap_err();
        assert_eq!(err.code(), "UNAVAILABLE");
    }

    let health = state.health();
    assert_eq!(health.state, BreakerState::Open);
    assert_eq!(health.failure_count, 5);
    assert!(!health.healthy);
    assert!(health.retry_in_secs.is_some());
    assert!(health.last_failure_at.is_some());

    // With the breaker open the next acquire is a short-circuit: no
    // connection attempt, so it returns essentially instantly.
    let started = Instant::now();
    let err = state.guard.acquire().await.unwrap_err();
    assert_eq!(err.code(), "UNAVAILABLE");
    assert!(err.retry_after().unwrap_or(0) > 0);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_wait_for_connection_fails_fast_once_open() {
    let state = unreachable_state();

    for _ in 0 .. 5 {
        let _ = state.guard.acquire().await;
    }
    assert_eq!(state.health().state, BreakerState::Open);

    // A 60 s budget, but the open breaker aborts the wait immediately
    // instead of retrying into a known-dead store.
    let started = Instant::now();
    let err = state
        .guard
        .wait_for_connection(Duration::from_secs(60))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "UNAVAILABLE");
    assert!(err.message().contains("circuit breaker"));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_wait_for_connection_succeeds_on_healthy_store() {
    let state = setup_state().await;

    state
        .guard
        .wait_for_connection(Duration::from_secs(5))
        .await
        .expect("healthy store should be acquired without waiting");
}

#[tokio::test]
async fn test_acquire_reuses_the_cached_pool() {
    let state = setup_state().await;

    // Both handles point at the same in-memory database: a row written
    // through one is visible through the other.
    let db_one = state.guard.acquire().await.unwrap();
    let db_two = state.guard.acquire().await.unwrap();

    use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set};

    let now = chrono::Utc::now();
    entity::users::Entity::insert(entity::users::ActiveModel {
        id:            Set(uuid::Uuid::new_v4()),
        email:         Set("cached@example.com".to_string()),
        password_hash: Set(None),
        name:          Set("Cache Probe".to_string()),
        is_admin:      Set(false),
        created_at:    Set(now),
        updated_at:    Set(now),
    })
    .exec(&db_one)
    .await
    .unwrap();

    let found = entity::users::Entity::find()
        .filter(entity::users::Column::Email.eq("cached@example.com"))
        .one(&db_two)
        .await
        .unwrap();

    assert!(found.is_some());
}

#[tokio::test]
async fn test_credential_failures_never_trip_the_breaker() {
    let state = setup_state().await;

    use common::device_a;
    use server::{dto::auth::LoginRequest, sessions};

    // Six failed logins in a row are credential failures, not store
    // failures: the breaker must stay closed and the seventh call must
    // still reach the store.
    for _ in 0 .. 6 {
        let err = sessions::login(
            &state,
            LoginRequest {
                email:    "ghost@example.com".to_string(),
                password: "WrongHorse7Battery".to_string(),
            },
            &device_a(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "INVALID_CREDENTIALS");
    }

    let health = state.health();
    assert_eq!(health.state, BreakerState::Closed);
    assert_eq!(health.failure_count, 0);
    assert!(health.healthy);
}
