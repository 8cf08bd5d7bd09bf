//! # Session Lifecycle Tests
//!
//! Exercises the login / refresh / logout state machine end to end over an
//! in-memory database.

mod common;

use common::{device_a, device_b, setup_state, unreachable_state};
use server::{
    dto::auth::{LoginRequest, LogoutRequest, RefreshRequest, RegisterRequest},
    refresh_tokens,
    sessions,
    AppError,
};
use uuid::Uuid;

fn register_req(email: &str) -> RegisterRequest {
    RegisterRequest {
        email:    email.to_string(),
        password: "CorrectHorse7Battery".to_string(),
        name:     "Pat Doe".to_string(),
    }
}

fn login_req(email: &str, password: &str) -> LoginRequest {
    LoginRequest {
        email:    email.to_string(),
        password: password.to_string(),
    }
}

#[tokio::test]
async fn test_register_then_login() {
    let state = setup_state().await;

    let registered = sessions::register(&state, register_req("pat@example.com"), &device_a())
        .await
        .expect("registration should succeed");

    assert_eq!(registered.user.email, "pat@example.com");
    assert!(!registered.user.is_admin);
    assert_eq!(registered.expires_in, 15 * 60);
    assert_eq!(registered.refresh_expires_in, 7 * 24 * 60 * 60);

    let logged_in = sessions::login(&state, login_req("pat@example.com", "CorrectHorse7Battery"), &device_a())
        .await
        .expect("login should succeed");

    assert_eq!(logged_in.user.id, registered.user.id);
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let state = setup_state().await;

    sessions::register(&state, register_req("pat@example.com"), &device_a())
        .await
        .unwrap();

    let err = sessions::register(&state, register_req("pat@example.com"), &device_b())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "CONFLICT");
}

#[tokio::test]
async fn test_register_weak_password_rejected() {
    let state = setup_state().await;

    let mut req = register_req("pat@example.com");
    req.password = "alllowercasebutlong".to_string();

    let err = sessions::register(&state, req, &device_a()).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_invalid_credentials_are_indistinguishable() {
    let state = setup_state().await;

    sessions::register(&state, register_req("pat@example.com"), &device_a())
        .await
        .unwrap();

    let wrong_password = sessions::login(&state, login_req("pat@example.com", "WrongHorse7Battery"), &device_a())
        .await
        .unwrap_err();
    let unknown_user = sessions::login(&state, login_req("ghost@example.com", "CorrectHorse7Battery"), &device_a())
        .await
        .unwrap_err();

    assert_eq!(wrong_password.code(), "INVALID_CREDENTIALS");
    assert_eq!(unknown_user.code(), "INVALID_CREDENTIALS");
    assert_eq!(wrong_password.message(), unknown_user.message());
}

#[tokio::test]
async fn test_admin_email_promoted_on_register() {
    let state = setup_state().await;

    let session = sessions::register(&state, register_req("root@gatehouse.test"), &device_a())
        .await
        .unwrap();

    assert!(session.user.is_admin);
}

#[tokio::test]
async fn test_single_active_session_per_device() {
    let state = setup_state().await;

    let first = sessions::register(&state, register_req("pat@example.com"), &device_a())
        .await
        .unwrap();
    let user_id = Uuid::parse_str(&first.user.id).unwrap();

    // Second login from the same device overwrites, never duplicates.
    sessions::login(&state, login_req("pat@example.com", "CorrectHorse7Battery"), &device_a())
        .await
        .unwrap();

    let db = state.guard.acquire().await.unwrap();
    assert_eq!(refresh_tokens::count_active_for_user(&db, user_id).await.unwrap(), 1);

    // A different device gets its own record.
    sessions::login(&state, login_req("pat@example.com", "CorrectHorse7Battery"), &device_b())
        .await
        .unwrap();
    assert_eq!(refresh_tokens::count_active_for_user(&db, user_id).await.unwrap(), 2);
}

#[tokio::test]
async fn test_refresh_rotates_the_refresh_token() {
    let state = setup_state().await;

    let first = sessions::register(&state, register_req("pat@example.com"), &device_a())
        .await
        .unwrap();

    let second = sessions::refresh(
        &state,
        RefreshRequest {
            refresh_token: first.refresh_token.clone(),
        },
        &device_a(),
    )
    .await
    .expect("refresh should succeed");

    assert_ne!(second.refresh_token, first.refresh_token);

    // The presented token died with the rotation.
    let replay = sessions::refresh(
        &state,
        RefreshRequest {
            refresh_token: first.refresh_token,
        },
        &device_a(),
    )
    .await
    .unwrap_err();
    assert_eq!(replay.code(), "INVALID_TOKEN");

    // The rotated token works.
    sessions::refresh(
        &state,
        RefreshRequest {
            refresh_token: second.refresh_token,
        },
        &device_a(),
    )
    .await
    .expect("rotated token should refresh");
}

#[tokio::test]
async fn test_rotation_preserves_token_family_and_device() {
    let state = setup_state().await;

    let first = sessions::register(&state, register_req("pat@example.com"), &device_a())
        .await
        .unwrap();
    let user_id = Uuid::parse_str(&first.user.id).unwrap();

    let db = state.guard.acquire().await.unwrap();
    let before = refresh_tokens::list_active_for_user(&db, user_id).await.unwrap();

    sessions::refresh(
        &state,
        RefreshRequest {
            refresh_token: first.refresh_token,
        },
        &device_a(),
    )
    .await
    .unwrap();

    let after = refresh_tokens::list_active_for_user(&db, user_id).await.unwrap();

    assert_eq!(before.len(), 1);
    assert_eq!(after.len(), 1);
    assert_eq!(before[0].token_family, after[0].token_family);
    assert_eq!(before[0].device_id, after[0].device_id);
    assert_ne!(before[0].token_hash, after[0].token_hash);
}

#[tokio::test]
async fn test_logout_revokes_refresh_and_blacklists_access() {
    let state = setup_state().await;

    let session = sessions::register(&state, register_req("pat@example.com"), &device_a())
        .await
        .unwrap();

    let ack = sessions::logout(
        &state,
        LogoutRequest {
            refresh_token: session.refresh_token.clone(),
            access_token:  Some(session.access_token.clone()),
        },
    )
    .await
    .expect("logout should succeed");
    assert!(ack.success);

    // The refresh token fails every subsequent refresh.
    let err = sessions::refresh(
        &state,
        RefreshRequest {
            refresh_token: session.refresh_token.clone(),
        },
        &device_a(),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), "INVALID_TOKEN");

    // The paired access token is dead before its natural expiry.
    let claims = auth::decode_unsafe(&session.access_token).unwrap();
    assert!(state
        .blacklist
        .is_blacklisted(&state.guard, &claims.jti)
        .await
        .unwrap());

    // Logging out again with the same refresh token is an error, not a no-op.
    let err = sessions::logout(
        &state,
        LogoutRequest {
            refresh_token: session.refresh_token,
            access_token:  None,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), "INVALID_TOKEN");
}

#[tokio::test]
async fn test_logout_all_devices() {
    let state = setup_state().await;

    let a = sessions::register(&state, register_req("pat@example.com"), &device_a())
        .await
        .unwrap();
    let b = sessions::login(&state, login_req("pat@example.com", "CorrectHorse7Battery"), &device_b())
        .await
        .unwrap();
    let user_id = Uuid::parse_str(&a.user.id).unwrap();

    sessions::logout_all(&state, user_id).await.unwrap();

    for token in [a.refresh_token, b.refresh_token] {
        let err = sessions::refresh(
            &state,
            RefreshRequest {
                refresh_token: token,
            },
            &device_a(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "INVALID_TOKEN");
    }
}

#[tokio::test]
async fn test_revoke_device_by_id() {
    let state = setup_state().await;

    let session = sessions::register(&state, register_req("pat@example.com"), &device_a())
        .await
        .unwrap();
    let user_id = Uuid::parse_str(&session.user.id).unwrap();

    let devices = sessions::list_devices(&state, user_id).await.unwrap();
    assert_eq!(devices.len(), 1);

    sessions::revoke_device(&state, user_id, &devices[0].device_id)
        .await
        .expect("revoke should succeed");

    let err = sessions::refresh(
        &state,
        RefreshRequest {
            refresh_token: session.refresh_token,
        },
        &device_a(),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), "INVALID_TOKEN");

    // Revoking an already-revoked device reports NotFound.
    let err = sessions::revoke_device(&state, user_id, &devices[0].device_id)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[tokio::test]
async fn test_tampered_refresh_token_never_reaches_the_store() {
    // The state's database is unreachable: if the signature check did not
    // precede the store lookup, this would surface as UNAVAILABLE.
    let state = unreachable_state();

    let mut tampered: Vec<String> = "a.b.c".split('.').map(String::from).collect();
    tampered[2] = "forged".to_string();

    let err = sessions::refresh(
        &state,
        RefreshRequest {
            refresh_token: tampered.join("."),
        },
        &device_a(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), "INVALID_TOKEN");
}

#[tokio::test]
async fn test_login_unavailable_when_store_down() {
    let state = unreachable_state();

    let err = sessions::login(&state, login_req("pat@example.com", "CorrectHorse7Battery"), &device_a())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Unavailable { .. }));
}
