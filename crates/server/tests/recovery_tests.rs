//! # Password Reset and Setup Flow Tests
//!
//! Covers rate limiting, read-only validation, single-use consumption,
//! and the password-change fan-out that revokes every session.

mod common;

use chrono::Utc;
use common::{device_a, device_b, setup_state};
use sea_orm::{ActiveModelTrait, Set};
use server::{
    dto::{
        auth::{LoginRequest, RefreshRequest, RegisterRequest},
        recovery::{ResetPasswordRequest, ResetRequest, SetupPasswordRequest},
    },
    password_reset,
    password_setup,
    sessions,
};
use uuid::Uuid;

const OLD_PASSWORD: &str = "CorrectHorse7Battery";
const NEW_PASSWORD: &str = "Tr0ubadour&Friends9";

fn register_req(email: &str) -> RegisterRequest {
    RegisterRequest {
        email:    email.to_string(),
        password: OLD_PASSWORD.to_string(),
        name:     "Pat Doe".to_string(),
    }
}

fn reset_req(email: &str) -> ResetRequest {
    ResetRequest {
        email: email.to_string(),
    }
}

/// The raw token travels only inside the URL handed to the mailer.
fn token_from_url(url: &str) -> String {
    url.split("token=").nth(1).expect("url should carry a token").to_string()
}

/// Inserts a provisioned user with no password set.
async fn provision_user(state: &server::AppState, email: &str) -> Uuid {
    let db = state.guard.acquire().await.unwrap();
    let now = Utc::now();

    let user = entity::users::ActiveModel {
        id:            Set(Uuid::new_v4()),
        email:         Set(email.to_string()),
        password_hash: Set(None),
        name:          Set("Provisioned Tenant".to_string()),
        is_admin:      Set(false),
        created_at:    Set(now),
        updated_at:    Set(now),
    }
    .insert(&db)
    .await
    .unwrap();

    user.id
}

#[tokio::test]
async fn test_reset_request_for_unknown_email_discloses_nothing() {
    let state = setup_state().await;

    let issued = password_reset::request_password_reset(&state, reset_req("ghost@example.com"), &device_a())
        .await
        .expect("request should not error");

    assert!(issued.is_none());
}

#[tokio::test]
async fn test_reset_validate_is_idempotent_and_consume_is_single_use() {
    let state = setup_state().await;
    sessions::register(&state, register_req("pat@example.com"), &device_a())
        .await
        .unwrap();

    let issued = password_reset::request_password_reset(&state, reset_req("pat@example.com"), &device_a())
        .await
        .unwrap()
        .expect("token should be issued");
    let token = token_from_url(&issued.reset_url);

    // Validation never consumes.
    for _ in 0 .. 3 {
        let info = password_reset::validate_reset_token(&state, &token)
            .await
            .unwrap()
            .expect("token should still be valid");
        assert_eq!(info.email, "pat@example.com");
    }

    // Exactly one consume succeeds.
    password_reset::reset_password(
        &state,
        ResetPasswordRequest {
            token:        token.clone(),
            new_password: NEW_PASSWORD.to_string(),
        },
    )
    .await
    .expect("first consume should succeed");

    let replay = password_reset::reset_password(
        &state,
        ResetPasswordRequest {
            token:        token.clone(),
            new_password: NEW_PASSWORD.to_string(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(replay.code(), "INVALID_TOKEN");

    // And validation now reports the token gone.
    assert!(password_reset::validate_reset_token(&state, &token)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_reset_rate_limit_rejects_the_request_step() {
    let state = setup_state().await;
    sessions::register(&state, register_req("pat@example.com"), &device_a())
        .await
        .unwrap();

    for _ in 0 .. 3 {
        password_reset::request_password_reset(&state, reset_req("pat@example.com"), &device_a())
            .await
            .unwrap()
            .expect("request within the window should issue");
    }

    let err = password_reset::request_password_reset(&state, reset_req("pat@example.com"), &device_a())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "RATE_LIMIT_EXCEEDED");
    assert_eq!(err.retry_after(), Some(3600));
}

#[tokio::test]
async fn test_password_change_fans_out_to_every_session() {
    let state = setup_state().await;

    let session_a = sessions::register(&state, register_req("pat@example.com"), &device_a())
        .await
        .unwrap();
    let session_b = sessions::login(
        &state,
        LoginRequest {
            email:    "pat@example.com".to_string(),
            password: OLD_PASSWORD.to_string(),
        },
        &device_b(),
    )
    .await
    .unwrap();

    let issued = password_reset::request_password_reset(&state, reset_req("pat@example.com"), &device_a())
        .await
        .unwrap()
        .unwrap();

    password_reset::reset_password(
        &state,
        ResetPasswordRequest {
            token:        token_from_url(&issued.reset_url),
            new_password: NEW_PASSWORD.to_string(),
        },
    )
    .await
    .unwrap();

    // 100% of pre-change refresh tokens are dead.
    for token in [session_a.refresh_token, session_b.refresh_token] {
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

    // Old password no longer works; the new one does.
    let err = sessions::login(
        &state,
        LoginRequest {
            email:    "pat@example.com".to_string(),
            password: OLD_PASSWORD.to_string(),
        },
        &device_a(),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), "INVALID_CREDENTIALS");

    sessions::login(
        &state,
        LoginRequest {
            email:    "pat@example.com".to_string(),
            password: NEW_PASSWORD.to_string(),
        },
        &device_a(),
    )
    .await
    .expect("new password should log in");
}

#[tokio::test]
async fn test_weak_replacement_password_rolls_back_nothing() {
    let state = setup_state().await;
    sessions::register(&state, register_req("pat@example.com"), &device_a())
        .await
        .unwrap();

    let issued = password_reset::request_password_reset(&state, reset_req("pat@example.com"), &device_a())
        .await
        .unwrap()
        .unwrap();
    let token = token_from_url(&issued.reset_url);

    let err = password_reset::reset_password(
        &state,
        ResetPasswordRequest {
            token:        token.clone(),
            new_password: "weakpassword".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    // The token is untouched and still consumable.
    assert!(password_reset::validate_reset_token(&state, &token)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_setup_token_requires_passwordless_user() {
    let state = setup_state().await;

    // A user with a password gets Conflict.
    let with_password = sessions::register(&state, register_req("pat@example.com"), &device_a())
        .await
        .unwrap();
    let err = password_setup::create_setup_token(&state, Uuid::parse_str(&with_password.user.id).unwrap(), &device_a())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "CONFLICT");

    // An unknown user gets NotFound.
    let err = password_setup::create_setup_token(&state, Uuid::new_v4(), &device_a())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[tokio::test]
async fn test_setup_flow_sets_password_and_enables_login() {
    let state = setup_state().await;
    let user_id = provision_user(&state, "tenant@example.com").await;

    let issued = password_setup::create_setup_token(&state, user_id, &device_a())
        .await
        .expect("setup token should be issued");
    assert!(issued.setup_url.contains("setup_token="));

    let token = issued.setup_url.split("setup_token=").nth(1).unwrap().to_string();

    let info = password_setup::validate_setup_token(&state, &token)
        .await
        .unwrap()
        .expect("token should validate");
    assert_eq!(info.email, "tenant@example.com");

    password_setup::set_password_with_token(
        &state,
        SetupPasswordRequest {
            token:        token.clone(),
            new_password: NEW_PASSWORD.to_string(),
        },
    )
    .await
    .expect("setup consume should succeed");

    // Single-use, like the reset flow.
    let replay = password_setup::set_password_with_token(
        &state,
        SetupPasswordRequest {
            token,
            new_password: NEW_PASSWORD.to_string(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(replay.code(), "INVALID_TOKEN");

    sessions::login(
        &state,
        LoginRequest {
            email:    "tenant@example.com".to_string(),
            password: NEW_PASSWORD.to_string(),
        },
        &device_a(),
    )
    .await
    .expect("provisioned user should now log in");
}

#[tokio::test]
async fn test_setup_rate_limit() {
    let state = setup_state().await;
    let user_id = provision_user(&state, "tenant@example.com").await;

    for _ in 0 .. 5 {
        password_setup::create_setup_token(&state, user_id, &device_a())
            .await
            .expect("request within the window should issue");
    }

    let err = password_setup::create_setup_token(&state, user_id, &device_a())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "RATE_LIMIT_EXCEEDED");
    assert_eq!(err.retry_after(), Some(86400));
}
