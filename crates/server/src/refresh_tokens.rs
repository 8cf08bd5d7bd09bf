//! # Refresh Token Records
//!
//! Persistence of per-(user, device) refresh-token records. The invariant:
//! at most one active record per (user, device) pair, enforced by a unique
//! key and an UPSERT rather than application-level locking, so concurrent
//! refreshes from the same device (duplicate network retries) can neither
//! duplicate rows nor lose a revocation.

use auth::ClientContext;
use chrono::{DateTime, Utc};
use entity::refresh_tokens::{ActiveModel, Column, Entity as RefreshTokensEntity, Model};
use error::{AppError, Result};
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ColumnTrait,
    Condition,
    ConnectionTrait,
    EntityTrait,
    PaginatorTrait,
    QueryFilter,
    QueryOrder,
    Set,
};
use tracing::{debug, info};
use uuid::Uuid;

/// Generates a fresh token-family identifier (128 random bits, hex).
///
/// A family groups every rotation of one device/session lineage.
#[must_use]
pub fn generate_token_family() -> String {
    let bytes = rand::random::<[u8; 16]>();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Stores (or overwrites) the refresh-token record for a device.
///
/// The write is an UPSERT against `UNIQUE(user_id, device_id)`: a new
/// login or rotation for a known device replaces the old fingerprint in
/// place and clears any revocation, keeping exactly one active record.
///
/// # Errors
///
/// Returns an error if database operations fail.
pub async fn store_refresh_token<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    token_hash: &str,
    token_family: &str,
    device_id: &str,
    expires_at: DateTime<Utc>,
    client: &ClientContext,
) -> Result<Model> {
    let model = ActiveModel {
        user_id:          Set(user_id),
        token_hash:       Set(token_hash.to_string()),
        token_family:     Set(token_family.to_string()),
        device_id:        Set(device_id.to_string()),
        expires_at:       Set(expires_at),
        revoked_at:       Set(None),
        origin:           Set(client.origin.clone()),
        client_signature: Set(client.client_signature.clone()),
        created_at:       Set(Utc::now()),
        ..Default::default()
    };

    RefreshTokensEntity::insert(model)
        .on_conflict(
            OnConflict::columns([Column::UserId, Column::DeviceId])
                .update_columns([
                    Column::TokenHash,
                    Column::TokenFamily,
                    Column::ExpiresAt,
                    Column::RevokedAt,
                    Column::Origin,
                    Column::ClientSignature,
                    Column::CreatedAt,
                ])
                .to_owned(),
        )
        .exec(conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to store refresh token: {}", e)))?;

    // Read back the canonical row; portable across backends, unlike
    // RETURNING on an upsert.
    let stored = RefreshTokensEntity::find()
        .filter(Column::UserId.eq(user_id))
        .filter(Column::DeviceId.eq(device_id))
        .one(conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to load stored refresh token: {}", e)))?
        .ok_or_else(|| AppError::internal("Refresh token vanished after upsert"))?;

    debug!(user_id = %user_id, device_id = %device_id, "Refresh token record stored");

    Ok(stored)
}

/// Finds the active (unexpired, unrevoked) record matching a token
/// fingerprint.
///
/// # Errors
///
/// Returns an error if database operations fail.
pub async fn find_active_by_hash<C: ConnectionTrait>(conn: &C, token_hash: &str) -> Result<Option<Model>> {
    RefreshTokensEntity::find()
        .filter(Column::TokenHash.eq(token_hash))
        .filter(Column::RevokedAt.is_null())
        .filter(Column::ExpiresAt.gt(Utc::now()))
        .one(conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to query refresh token: {}", e)))
}

/// Revokes the record matching a token fingerprint.
///
/// Returns `false` when no active record matched.
///
/// # Errors
///
/// Returns an error if database operations fail.
pub async fn revoke_by_hash<C: ConnectionTrait>(conn: &C, token_hash: &str) -> Result<bool> {
    let result = RefreshTokensEntity::update_many()
        .col_expr(Column::RevokedAt, Expr::value(Some(Utc::now())))
        .filter(Column::TokenHash.eq(token_hash))
        .filter(Column::RevokedAt.is_null())
        .exec(conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to revoke refresh token: {}", e)))?;

    Ok(result.rows_affected > 0)
}

/// Revokes every active record for a user in one statement.
///
/// Returns the number of revoked records.
///
/// # Errors
///
/// Returns an error if database operations fail.
pub async fn revoke_all_for_user<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> Result<u64> {
    let result = RefreshTokensEntity::update_many()
        .col_expr(Column::RevokedAt, Expr::value(Some(Utc::now())))
        .filter(Column::UserId.eq(user_id))
        .filter(Column::RevokedAt.is_null())
        .exec(conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to revoke user tokens: {}", e)))?;

    if result.rows_affected > 0 {
        info!(user_id = %user_id, count = result.rows_affected, "Revoked all refresh tokens for user");
    }

    Ok(result.rows_affected)
}

/// Revokes one named device's record without a bearer token in hand.
///
/// Returns `false` when the device had no active record.
///
/// # Errors
///
/// Returns an error if database operations fail.
pub async fn revoke_device<C: ConnectionTrait>(conn: &C, user_id: Uuid, device_id: &str) -> Result<bool> {
    let result = RefreshTokensEntity::update_many()
        .col_expr(Column::RevokedAt, Expr::value(Some(Utc::now())))
        .filter(Column::UserId.eq(user_id))
        .filter(Column::DeviceId.eq(device_id))
        .filter(Column::RevokedAt.is_null())
        .exec(conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to revoke device token: {}", e)))?;

    Ok(result.rows_affected > 0)
}

/// Lists a user's active device records, newest first.
///
/// # Errors
///
/// Returns an error if database operations fail.
pub async fn list_active_for_user<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> Result<Vec<Model>> {
    RefreshTokensEntity::find()
        .filter(Column::UserId.eq(user_id))
        .filter(Column::RevokedAt.is_null())
        .filter(Column::ExpiresAt.gt(Utc::now()))
        .order_by_desc(Column::CreatedAt)
        .all(conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to list user devices: {}", e)))
}

/// Counts a user's active records. Used by tests and admin tooling.
///
/// # Errors
///
/// Returns an error if database operations fail.
pub async fn count_active_for_user<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> Result<u64> {
    RefreshTokensEntity::find()
        .filter(Column::UserId.eq(user_id))
        .filter(Column::RevokedAt.is_null())
        .filter(Column::ExpiresAt.gt(Utc::now()))
        .count(conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to count user devices: {}", e)))
}

/// Deletes expired and revoked rows. Run by the periodic sweep.
///
/// # Errors
///
/// Returns an error if database operations fail.
pub async fn purge_settled<C: ConnectionTrait>(conn: &C) -> Result<u64> {
    let result = RefreshTokensEntity::delete_many()
        .filter(
            Condition::any()
                .add(Column::ExpiresAt.lt(Utc::now()))
                .add(Column::RevokedAt.is_not_null()),
        )
        .exec(conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to purge refresh tokens: {}", e)))?;

    Ok(result.rows_affected)
}
