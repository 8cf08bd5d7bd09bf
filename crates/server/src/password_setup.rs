//! # Password Setup Flow
//!
//! Initial password setup for users provisioned without one. Same state
//! machine as the reset flow — requested, issued, consumed-or-expired —
//! with a longer token lifetime and its own rate-limit window. Requesting
//! a setup token for a user who already has a password is a `Conflict`.

use auth::{fingerprint_token, hash_password, validate_password_strength, ClientContext, secrecy::SecretString};
use chrono::{DateTime, Duration, Utc};
use entity::password_setup_tokens::{ActiveModel, Column, Entity as SetupTokensEntity};
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
        recovery::{RecoveryTokenInfo, SetupPasswordRequest},
    },
    refresh_tokens,
    AppState,
};

/// A successfully issued setup token, with the URL for the email
/// collaborator.
#[derive(Debug, Clone)]
pub struct IssuedSetup {
    pub user_id:    Uuid,
    pub email:      String,
    pub setup_url:  String,
    pub expires_at: DateTime<Utc>,
}

/// Generates a high-entropy setup token (256 random bits, hex).
fn generate_setup_token() -> String {
    let bytes = rand::random::<[u8; 32]>();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Issues a setup token for a freshly provisioned user.
///
/// # Errors
///
/// `NotFound` for unknown users, `Conflict` when a password is already
/// set, `RateLimited` when the per-user window is exhausted.
pub async fn create_setup_token(state: &AppState, user_id: Uuid, client: &ClientContext) -> Result<IssuedSetup> {
    let db = state.guard.acquire().await?;

    let user = UsersEntity::find_by_id(user_id)
        .one(&db)
        .await
        .map_err(|e| AppError::database(format!("Failed to look up user: {}", e)))?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    if user.has_password() {
        return Err(AppError::conflict("User already has a password set"));
    }

    let cfg = &state.config.recovery;
    let window_start = Utc::now() - Duration::seconds(cfg.setup_window_secs as i64);
    let recent = SetupTokensEntity::find()
        .filter(Column::UserId.eq(user.id))
        .filter(Column::CreatedAt.gt(window_start))
        .count(&db)
        .await
        .map_err(|e| AppError::database(format!("Failed to count setup requests: {}", e)))?;

    if recent >= cfg.setup_max_requests {
        warn!(user_id = %user.id, attempts = recent, "Password setup rate limit exceeded");
        return Err(AppError::rate_limited(
            "Too many setup requests. Please contact support.",
            cfg.setup_window_secs,
        ));
    }

    let token = generate_setup_token();
    let expires_at = Utc::now() + Duration::seconds(cfg.setup_token_ttl_secs as i64);

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
    .map_err(|e| AppError::database(format!("Failed to store setup token: {}", e)))?;

    let setup_url = format!(
        "{}/login?setup_token={}",
        state.config.frontend_url.trim_end_matches('/'),
        token
    );

    if let Err(e) = state
        .mailer
        .send_password_setup(&user.email, &user.name, &setup_url, expires_at)
        .await
    {
        warn!(user_id = %user.id, error = %e, "Setup email failed; issued token remains valid");
    }

    info!(user_id = %user.id, "Password setup token issued");

    Ok(IssuedSetup {
        user_id: user.id,
        email: user.email,
        setup_url,
        expires_at,
    })
}

/// Read-only, idempotent validity check. Never consumes the token.
///
/// # Errors
///
/// Returns an error if database operations fail.
pub async fn validate_setup_token(state: &AppState, token: &str) -> Result<Option<RecoveryTokenInfo>> {
    let db = state.guard.acquire().await?;

    let Some(row) = find_valid(&db, token).await? else {
        return Ok(None);
    };

    let user = UsersEntity::find_by_id(row.user_id)
        .one(&db)
        .await
        .map_err(|e| AppError::database(format!("Failed to load user for setup token: {}", e)))?
        .ok_or_else(|| AppError::invalid_token("Invalid or expired setup token"))?;

    Ok(Some(RecoveryTokenInfo {
        email:      user.email,
        name:       user.name,
        expires_at: row.expires_at,
    }))
}

/// Consumes a setup token: password set, token marked used, all sessions
/// revoked — one transaction, full rollback on any failure.
///
/// # Errors
///
/// `InvalidToken` for unknown/expired/used tokens; `Validation` when the
/// new password fails the strength policy.
pub async fn set_password_with_token(state: &AppState, req: SetupPasswordRequest) -> Result<SuccessResponse> {
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

    let row = find_valid(&txn, &req.token)
        .await?
        .ok_or_else(|| AppError::invalid_token("Invalid or expired setup token"))?;
    let user_id = row.user_id;

    let user = UsersEntity::find_by_id(user_id)
        .one(&txn)
        .await
        .map_err(|e| AppError::database(format!("Failed to load user: {}", e)))?
        .ok_or_else(|| AppError::invalid_token("Invalid or expired setup token"))?;

    let password_hash = hash_password(&SecretString::from(req.new_password))
        .map_err(|e| AppError::internal(format!("Password hashing failed: {}", e)))?;

    let now = Utc::now();

    let mut user_active: entity::users::ActiveModel = user.into();
    user_active.password_hash = Set(Some(password_hash));
    user_active.updated_at = Set(now);
    user_active
        .update(&txn)
        .await
        .map_err(|e| AppError::database(format!("Failed to set password: {}", e)))?;

    let mut row_active: ActiveModel = row.into();
    row_active.used_at = Set(Some(now));
    row_active
        .update(&txn)
        .await
        .map_err(|e| AppError::database(format!("Failed to mark setup token used: {}", e)))?;

    // Provisioned users should have no sessions yet, but a password change
    // revokes whatever exists all the same.
    refresh_tokens::revoke_all_for_user(&txn, user_id).await?;

    txn.commit()
        .await
        .map_err(|e| AppError::database(format!("Failed to commit password setup: {}", e)))?;

    info!(user_id = %user_id, "Password setup completed");

    Ok(SuccessResponse::new("Password has been set"))
}

/// Deletes expired and used rows. Run by the periodic sweep.
///
/// # Errors
///
/// Returns an error if database operations fail.
pub async fn purge_settled<C: ConnectionTrait>(conn: &C) -> Result<u64> {
    let result = SetupTokensEntity::delete_many()
        .filter(
            Condition::any()
                .add(Column::ExpiresAt.lt(Utc::now()))
                .add(Column::UsedAt.is_not_null()),
        )
        .exec(conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to purge setup tokens: {}", e)))?;

    Ok(result.rows_affected)
}

/// Valid = fingerprint match, unexpired, unused.
async fn find_valid<C: ConnectionTrait>(
    conn: &C,
    token: &str,
) -> Result<Option<entity::password_setup_tokens::Model>> {
    SetupTokensEntity::find()
        .filter(Column::TokenHash.eq(fingerprint_token(token)))
        .filter(Column::ExpiresAt.gt(Utc::now()))
        .filter(Column::UsedAt.is_null())
        .one(conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to query setup token: {}", e)))
}
