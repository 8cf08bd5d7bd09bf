//! # Password Reset Flow
//!
//! Single-use, time-boxed, rate-limited reset tokens. Only the token's
//! one-way fingerprint is stored; the raw token travels once, inside the
//! reset URL handed to the email collaborator. Consuming a token is one
//! atomic transaction: password update, token marked used, and every
//! active refresh token revoked — a completed password change forces
//! re-authentication everywhere.

use auth::{fingerprint_token, hash_password, validate_password_strength, ClientContext, secrecy::SecretString};
use chrono::{DateTime, Duration, Utc};
use entity::password_reset_tokens::{ActiveModel, Column, Entity as ResetTokensEntity};
use entity::users::Entity as UsersEntity;
use error::{AppError, Result};
use sea_orm::{
    ActiveModelTrait,
    ColumnTrait,
    Condition,
    ConnectionTrait,
    EntityTrait,
    PaginatorTrait,
    QueryFilter,
    Set,
    TransactionTrait,
};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        auth::SuccessResponse,
        recovery::{RecoveryTokenInfo, ResetPasswordRequest, ResetRequest},
    },
    refresh_tokens,
    AppState,
};

/// A successfully issued reset token, with the URL for the email
/// collaborator. The raw token exists only here.
#[derive(Debug, Clone)]
pub struct IssuedReset {
    pub user_id:    Uuid,
    pub email:      String,
    pub reset_url:  String,
    pub expires_at: DateTime<Utc>,
}

/// Generates a high-entropy reset token (256 random bits, hex).
fn generate_reset_token() -> String {
    let bytes = rand::random::<[u8; 32]>();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Requests a password reset for an email address.
///
/// Returns `Ok(None)` for unknown emails — the caller must not be able to
/// probe which accounts exist. Email delivery is best-effort: the issued
/// token is the source of truth and survives a failed send.
///
/// # Errors
///
/// `RateLimited` when the per-user window is exhausted; store errors
/// otherwise.
pub async fn request_password_reset(
    state: &AppState,
    req: ResetRequest,
    client: &ClientContext,
) -> Result<Option<IssuedReset>> {
    req.validate()?;

    let db = state.guard.acquire().await?;
    let email = req.email.trim().to_lowercase();

    let Some(user) = UsersEntity::find()
        .filter(entity::users::Column::Email.eq(&email))
        .one(&db)
        .await
        .map_err(|e| AppError::database(format!("Failed to look up user: {}", e)))?
    else {
        info!("Password reset requested for unknown email");
        return Ok(None);
    };

    let cfg = &state.config.recovery;
    let window_start = Utc::now() - Duration::seconds(cfg.reset_window_secs as i64);
    let recent = ResetTokensEntity::find()
        .filter(Column::UserId.eq(user.id))
        .filter(Column::CreatedAt.gt(window_start))
        .count(&db)
        .await
        .map_err(|e| AppError::database(format!("Failed to count reset requests: {}", e)))?;

    if recent >= cfg.reset_max_requests {
        warn!(user_id = %user.id, attempts = recent, "Password reset rate limit exceeded");
        return Err(AppError::rate_limited(
            "Too many reset requests. Please try again later.",
            cfg.reset_window_secs,
        ));
    }

    let token = generate_reset_token();
    let expires_at = Utc::now() + Duration::seconds(cfg.reset_token_ttl_secs as i64);

    ActiveModel {
        user_id:          Set(user.id),
        token_hash:       Set(fingerprint_token(&token)),
        expires_at:       Set(expires_at),
        used_at:          Set(None),
        origin:           Set(client.origin.clone()),
        client_signature: Set(client.client_signature.clone()),
        created_at:       Set(Utc::now()),
        ..Default::default()
    }
    .insert(&db)
    .await
    .map_err(|e| AppError::database(format!("Failed to store reset token: {}", e)))?;

    let reset_url = format!(
        "{}/reset-password?token={}",
        state.config.frontend_url.trim_end_matches('/'),
        token
    );

    if let Err(e) = state
        .mailer
        .send_password_reset(&user.email, &user.name, &reset_url, expires_at)
        .await
    {
        warn!(user_id = %user.id, error = %e, "Reset email failed; issued token remains valid");
    }

    info!(user_id = %user.id, "Password reset token issued");

    Ok(Some(IssuedReset {
        user_id: user.id,
        email: user.email,
        reset_url,
        expires_at,
    }))
}

/// Read-only, idempotent validity check. Never consumes the token.
///
/// # Errors
///
/// Returns an error if database operations fail.
pub async fn validate_reset_token(state: &AppState, token: &str) -> Result<Option<RecoveryTokenInfo>> {
    let db = state.guard.acquire().await?;

    let Some(row) = find_valid(&db, token).await? else {
        return Ok(None);
    };

    let user = UsersEntity::find_by_id(row.user_id)
        .one(&db)
        .await
        .map_err(|e| AppError::database(format!("Failed to load user for reset token: {}", e)))?
        .ok_or_else(|| AppError::invalid_token("Invalid or expired reset token"))?;

    Ok(Some(RecoveryTokenInfo {
        email:      user.email,
        name:       user.name,
        expires_at: row.expires_at,
    }))
}

/// Consumes a reset token: one transaction covering the password update,
/// the used-at mark, and revocation of every active refresh token. Any
/// failure rolls the whole thing back.
///
/// # Errors
///
/// `InvalidToken` for unknown/expired/used tokens; `Validation` when the
/// new password fails the strength policy.
pub async fn reset_password(state: &AppState, req: ResetPasswordRequest) -> Result<SuccessResponse> {
    req.validate()?;

    if let Err(errors) = validate_password_strength(&req.new_password) {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        return Err(AppError::validation(messages.join(", ")));
    }

    let db = state.guard.acquire().await?;
    let txn = db
        .begin()
        .await
        .map_err(|e| AppError::database(format!("Failed to begin transaction: {}", e)))?;

    // Revalidated inside the transaction; a concurrent consume loses here.
    let row = find_valid(&txn, &req.token)
        .await?
        .ok_or_else(|| AppError::invalid_token("Invalid or expired reset token"))?;
    let user_id = row.user_id;

    let user = UsersEntity::find_by_id(user_id)
        .one(&txn)
        .await
        .map_err(|e| AppError::database(format!("Failed to load user: {}", e)))?
        .ok_or_else(|| AppError::invalid_token("Invalid or expired reset token"))?;

    let password_hash = hash_password(&SecretString::from(req.new_password))
        .map_err(|e| AppError::internal(format!("Password hashing failed: {}", e)))?;

    let now = Utc::now();

    let mut user_active: entity::users::ActiveModel = user.into();
    user_active.password_hash = Set(Some(password_hash));
    user_active.updated_at = Set(now);
    user_active
        .update(&txn)
        .await
        .map_err(|e| AppError::database(format!("Failed to update password: {}", e)))?;

    let mut row_active: ActiveModel = row.into();
    row_active.used_at = Set(Some(now));
    row_active
        .update(&txn)
        .await
        .map_err(|e| AppError::database(format!("Failed to mark reset token used: {}", e)))?;

    // A completed password change invalidates every existing session.
    refresh_tokens::revoke_all_for_user(&txn, user_id).await?;

    txn.commit()
        .await
        .map_err(|e| AppError::database(format!("Failed to commit password reset: {}", e)))?;

    info!(user_id = %user_id, "Password reset completed; all sessions revoked");

    Ok(SuccessResponse::new("Password has been reset"))
}

/// Deletes expired and used rows. Run by the periodic sweep.
///
/// # Errors
///
/// Returns an error if database operations fail.
pub async fn purge_settled<C: ConnectionTrait>(conn: &C) -> Result<u64> {
    let result = ResetTokensEntity::delete_many()
        .filter(
            Condition::any()
                .add(Column::ExpiresAt.lt(Utc::now()))
                .add(Column::UsedAt.is_not_null()),
        )
        .exec(conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to purge reset tokens: {}", e)))?;

    Ok(result.rows_affected)
}

/// Valid = fingerprint match, unexpired, unused.
async fn find_valid<C: ConnectionTrait>(
    conn: &C,
    token: &str,
) -> Result<Option<entity::password_reset_tokens::Model>> {
    ResetTokensEntity::find()
        .filter(Column::TokenHash.eq(fingerprint_token(token)))
        .filter(Column::ExpiresAt.gt(Utc::now()))
        .filter(Column::UsedAt.is_null())
        .one(conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to query reset token: {}", e)))
}
