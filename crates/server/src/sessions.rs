//! # Session Manager
//!
//! The login / refresh / logout state machine per (user, device). Every
//! operation goes to the store through the connection guard; credential
//! failures surface as one indistinguishable `InvalidCredentials`, and
//! refresh fails closed on any lookup miss.

use auth::{
    decode_unsafe,
    fingerprint_token,
    hash_password,
    validate_password_strength,
    verify_password,
    ClientContext,
    TokenError,
    TokenIdentity,
    TokenKind,
    secrecy::SecretString,
};
use chrono::{Duration, Utc};
use entity::users::{Column as UserColumn, Entity as UsersEntity};
use error::{AppError, Result};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::auth::{AuthSession, DeviceSession, LoginRequest, LogoutRequest, RefreshRequest, RegisterRequest, SuccessResponse, UserProfile},
    refresh_tokens,
    AppState,
};

/// Registers a new user and opens their first session.
///
/// # Errors
///
/// `Conflict` when the email is already taken; `Validation` when the
/// request or password policy fails; `Unavailable` when the store is
/// unreachable.
pub async fn register(state: &AppState, req: RegisterRequest, client: &ClientContext) -> Result<AuthSession> {
    req.validate()?;

    if let Err(errors) = validate_password_strength(&req.password) {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        return Err(AppError::validation(messages.join(", ")));
    }

    let db = state.guard.acquire().await?;
    let email = req.email.trim().to_lowercase();

    let existing = UsersEntity::find()
        .filter(UserColumn::Email.eq(&email))
        .one(&db)
        .await
        .map_err(|e| AppError::database(format!("Failed to check email uniqueness: {}", e)))?;

    if existing.is_some() {
        return Err(AppError::conflict("A user with this email already exists"));
    }

    let password_hash = hash_password(&SecretString::from(req.password))
        .map_err(|e| AppError::internal(format!("Password hashing failed: {}", e)))?;

    let is_admin = state.config.admin_emails.iter().any(|a| a == &email);
    let now = Utc::now();

    let user = entity::users::ActiveModel {
        id:            Set(Uuid::new_v4()),
        email:         Set(email),
        password_hash: Set(Some(password_hash)),
        name:          Set(req.name),
        is_admin:      Set(is_admin),
        created_at:    Set(now),
        updated_at:    Set(now),
    }
    .insert(&db)
    .await
    .map_err(|e| AppError::database(format!("Failed to create user: {}", e)))?;

    info!(user_id = %user.id, is_admin = user.is_admin, "User registered");

    open_session(state, &db, &user, &client.device_id(), &refresh_tokens::generate_token_family(), client).await
}

/// Verifies credentials and opens a session for the device.
///
/// # Errors
///
/// `InvalidCredentials` for unknown email, unset password, or mismatch —
/// never distinguishable from each other.
pub async fn login(state: &AppState, req: LoginRequest, client: &ClientContext) -> Result<AuthSession> {
    req.validate()?;

    let db = state.guard.acquire().await?;
    let email = req.email.trim().to_lowercase();

    let user = UsersEntity::find()
        .filter(UserColumn::Email.eq(&email))
        .one(&db)
        .await
        .map_err(|e| AppError::database(format!("Failed to look up user: {}", e)))?
        .ok_or(AppError::InvalidCredentials)?;

    let stored_hash = user
        .password_hash
        .as_deref()
        .filter(|h| !h.trim().is_empty())
        .ok_or(AppError::InvalidCredentials)?;

    verify_password(&SecretString::from(req.password), stored_hash).map_err(|_| AppError::InvalidCredentials)?;

    // Configured admin emails are promoted on login.
    let user = if !user.is_admin && state.config.admin_emails.iter().any(|a| a == &user.email) {
        let mut active: entity::users::ActiveModel = user.into();
        active.is_admin = Set(true);
        active.updated_at = Set(Utc::now());
        active
            .update(&db)
            .await
            .map_err(|e| AppError::database(format!("Failed to promote admin user: {}", e)))?
    }
    else {
        user
    };

    info!(user_id = %user.id, "User logged in");

    open_session(state, &db, &user, &client.device_id(), &refresh_tokens::generate_token_family(), client).await
}

/// Exchanges a refresh token for a fresh token pair.
///
/// The signature check happens before any store access — a tampered token
/// never reaches the database. On success the refresh token is rotated:
/// the stored fingerprint is overwritten in place (same device, same
/// family) and the presented token is dead.
///
/// # Errors
///
/// `InvalidToken` on any verification or lookup miss, fail closed.
pub async fn refresh(state: &AppState, req: RefreshRequest, client: &ClientContext) -> Result<AuthSession> {
    req.validate()?;

    state
        .codec
        .verify(TokenKind::Refresh, &req.refresh_token)
        .map_err(|e| {
            match e {
                TokenError::MissingSecret => AppError::config("Signing secret is not configured"),
                _ => AppError::invalid_token("Invalid refresh token"),
            }
        })?;

    let db = state.guard.acquire().await?;

    let record = refresh_tokens::find_active_by_hash(&db, &fingerprint_token(&req.refresh_token))
        .await?
        .ok_or_else(|| AppError::invalid_token("Invalid refresh token"))?;

    let user = UsersEntity::find_by_id(record.user_id)
        .one(&db)
        .await
        .map_err(|e| AppError::database(format!("Failed to load user for refresh: {}", e)))?
        .ok_or_else(|| AppError::invalid_token("Invalid refresh token"))?;

    let session = open_session(state, &db, &user, &record.device_id, &record.token_family, client).await?;

    info!(user_id = %user.id, device_id = %record.device_id, "Refresh token rotated");

    Ok(session)
}

/// Logs out one device: revokes the refresh record and blacklists the
/// paired access token for its remaining natural lifetime.
///
/// # Errors
///
/// `InvalidToken` when the refresh token matches no active record.
pub async fn logout(state: &AppState, req: LogoutRequest) -> Result<SuccessResponse> {
    req.validate()?;

    let db = state.guard.acquire().await?;

    let revoked = refresh_tokens::revoke_by_hash(&db, &fingerprint_token(&req.refresh_token)).await?;
    if !revoked {
        return Err(AppError::invalid_token("Invalid refresh token"));
    }

    if let Some(access_token) = req.access_token.as_deref() {
        blacklist_access_token(state, access_token, "logout").await;
    }

    Ok(SuccessResponse::new("Successfully logged out"))
}

/// Logs out every device for a user in one statement.
///
/// # Errors
///
/// Returns an error if database operations fail.
pub async fn logout_all(state: &AppState, user_id: Uuid) -> Result<SuccessResponse> {
    let db = state.guard.acquire().await?;
    let count = refresh_tokens::revoke_all_for_user(&db, user_id).await?;

    info!(user_id = %user_id, count, "Logged out all devices");

    Ok(SuccessResponse::new(format!("Logged out {} device(s)", count)))
}

/// Revokes one named device's session without a bearer token in hand.
///
/// # Errors
///
/// `NotFound` when the device has no active record.
pub async fn revoke_device(state: &AppState, user_id: Uuid, device_id: &str) -> Result<SuccessResponse> {
    let db = state.guard.acquire().await?;

    let revoked = refresh_tokens::revoke_device(&db, user_id, device_id).await?;
    if !revoked {
        return Err(AppError::not_found("Device not found"));
    }

    info!(user_id = %user_id, device_id = %device_id, "Device session revoked");

    Ok(SuccessResponse::new("Device session revoked"))
}

/// Lists a user's active device sessions, newest first.
///
/// # Errors
///
/// Returns an error if database operations fail.
pub async fn list_devices(state: &AppState, user_id: Uuid) -> Result<Vec<DeviceSession>> {
    let db = state.guard.acquire().await?;
    let records = refresh_tokens::list_active_for_user(&db, user_id).await?;

    Ok(records.iter().map(DeviceSession::from).collect())
}

/// Mints a token pair and upserts the device's refresh record.
async fn open_session(
    state: &AppState,
    db: &DatabaseConnection,
    user: &entity::users::Model,
    device_id: &str,
    token_family: &str,
    client: &ClientContext,
) -> Result<AuthSession> {
    let identity = TokenIdentity {
        user_id:  user.id,
        email:    user.email.clone(),
        is_admin: user.is_admin,
    };

    let access_token = state
        .codec
        .mint(TokenKind::Access, &identity)
        .map_err(|e| AppError::config(format!("Cannot mint access token: {}", e)))?;
    let refresh_token = state
        .codec
        .mint(TokenKind::Refresh, &identity)
        .map_err(|e| AppError::config(format!("Cannot mint refresh token: {}", e)))?;

    let refresh_ttl = state.codec.ttl_seconds(TokenKind::Refresh);
    let expires_at = Utc::now() + Duration::seconds(refresh_ttl as i64);

    refresh_tokens::store_refresh_token(
        db,
        user.id,
        &fingerprint_token(&refresh_token),
        token_family,
        device_id,
        expires_at,
        client,
    )
    .await?;

    Ok(AuthSession {
        user: UserProfile::from(user),
        access_token,
        refresh_token,
        expires_in: state.codec.ttl_seconds(TokenKind::Access),
        refresh_expires_in: refresh_ttl,
    })
}

/// Best-effort blacklisting of an access token; a failure here must not
/// fail the logout that triggered it.
async fn blacklist_access_token(state: &AppState, access_token: &str, reason: &str) {
    let Some(claims) = decode_unsafe(access_token) else {
        warn!("Access token on logout could not be decoded; skipping blacklist");
        return;
    };

    let Ok(user_id) = Uuid::parse_str(&claims.sub) else {
        warn!("Access token on logout carries a malformed subject; skipping blacklist");
        return;
    };

    let Some(expires_at) = claims.expires_at() else {
        warn!("Access token on logout carries no usable expiry; skipping blacklist");
        return;
    };

    if let Err(e) = state
        .blacklist
        .insert(&state.guard, &claims.jti, user_id, expires_at, Some(reason))
        .await
    {
        warn!(error = %e, "Failed to blacklist access token on logout");
    }
}
