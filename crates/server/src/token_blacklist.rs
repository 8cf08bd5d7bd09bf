//! # Token Blacklist
//!
//! Forces early invalidation of access tokens whose natural expiry has
//! not yet passed: logout must be effective immediately, not fifteen
//! minutes later. Primary store is the `token_blacklist` table keyed by
//! the token ID minted into every access token. When the connection guard
//! reports the store unavailable, a process-local expiring map takes the
//! writes instead — best-effort, lost on restart, and documented as the
//! availability/security trade-off of degraded mode.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use entity::token_blacklist::{ActiveModel, Column, Entity as BlacklistEntity};
use error::{AppError, Result};
use sea_orm::{sea_query::OnConflict, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::connection::ConnectionGuard;

/// Access-token revocation service.
#[derive(Debug, Clone, Default)]
pub struct TokenBlacklist {
    /// Process-local fallback, keyed by token ID with the token's natural
    /// expiry. Entries are evicted lazily on read; no background timer.
    fallback: Arc<Mutex<HashMap<String, DateTime<Utc>>>>,
}

impl TokenBlacklist {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Blacklists a token ID until its natural expiry.
    ///
    /// Falls back to the in-process map when the store is unavailable.
    ///
    /// # Errors
    ///
    /// Returns an error only on a real database failure; unavailability is
    /// absorbed by the fallback.
    pub async fn insert(
        &self,
        guard: &ConnectionGuard,
        token_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
        reason: Option<&str>,
    ) -> Result<()> {
        match guard.acquire().await {
            Ok(db) => {
                let model = ActiveModel {
                    token_id:   Set(token_id.to_string()),
                    user_id:    Set(user_id),
                    expires_at: Set(expires_at),
                    reason:     Set(reason.map(|r| r.to_string())),
                    created_at: Set(Utc::now()),
                };

                let insert = BlacklistEntity::insert(model)
                    .on_conflict(OnConflict::column(Column::TokenId).do_nothing().to_owned())
                    .exec(&db)
                    .await;

                match insert {
                    Ok(_) => {},
                    // Already blacklisted; the check is a pure existence test.
                    Err(DbErr::RecordNotInserted) => {},
                    Err(e) => return Err(AppError::database(format!("Failed to blacklist token: {}", e))),
                }

                debug!(token_id = %token_id, user_id = %user_id, "Access token blacklisted");
                Ok(())
            },
            Err(AppError::Unavailable { .. }) => {
                warn!(
                    token_id = %token_id,
                    "Store unavailable; access token blacklisted in process-local fallback only"
                );
                self.lock_fallback().insert(token_id.to_string(), expires_at);
                Ok(())
            },
            Err(e) => Err(e),
        }
    }

    /// Pure existence check, called on every access-token verification in
    /// the consuming layer.
    ///
    /// During a store outage the answer comes from the fallback map alone:
    /// revocations persisted before the outage are invisible until the
    /// store returns.
    ///
    /// # Errors
    ///
    /// Returns an error only on a real database failure.
    pub async fn is_blacklisted(&self, guard: &ConnectionGuard, token_id: &str) -> Result<bool> {
        {
            let mut fallback = self.lock_fallback();
            let now = Utc::now();
            fallback.retain(|_, expires_at| *expires_at > now);

            if fallback.contains_key(token_id) {
                return Ok(true);
            }
        }

        match guard.acquire().await {
            Ok(db) => {
                let hit = BlacklistEntity::find_by_id(token_id)
                    .one(&db)
                    .await
                    .map_err(|e| AppError::database(format!("Failed to check token blacklist: {}", e)))?;

                Ok(hit.is_some())
            },
            Err(AppError::Unavailable { .. }) => {
                warn!("Store unavailable; blacklist check degraded to process-local fallback");
                Ok(false)
            },
            Err(e) => Err(e),
        }
    }

    /// Deletes rows whose token has passed its natural expiry, and evicts
    /// the fallback map. Run by the periodic sweep.
    ///
    /// # Errors
    ///
    /// Returns an error if database operations fail.
    pub async fn prune_expired<C: ConnectionTrait>(&self, conn: &C) -> Result<u64> {
        let now = Utc::now();

        self.lock_fallback().retain(|_, expires_at| *expires_at > now);

        let result = BlacklistEntity::delete_many()
            .filter(Column::ExpiresAt.lt(now))
            .exec(conn)
            .await
            .map_err(|e| AppError::database(format!("Failed to prune token blacklist: {}", e)))?;

        Ok(result.rows_affected)
    }

    /// Number of entries currently in the fallback map.
    #[must_use]
    pub fn fallback_len(&self) -> usize { self.lock_fallback().len() }

    fn lock_fallback(&self) -> std::sync::MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.fallback.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
