//! # Gatehouse Session Core
//!
//! The authentication & session lifecycle core of the Gatehouse platform,
//! plus the database-availability guard that protects it. The external
//! HTTP layer calls into these services; nothing in this crate parses a
//! request or renders a response.
//!
//! ## Modules
//!
//! - [`connection`]: circuit-breaker guard around the database pool
//! - [`sessions`]: login / refresh / logout state machine per (user, device)
//! - [`refresh_tokens`]: persistence of per-device refresh-token records
//! - [`token_blacklist`]: early invalidation of access tokens
//! - [`password_reset`] / [`password_setup`]: single-use token flows
//! - [`config`]: environment configuration surface with startup validation
//! - [`mailer`]: best-effort email delivery seam
//! - [`maintenance`]: sweep of expired credential records

use std::sync::Arc;

use auth::TokenCodec;

pub mod config;
pub mod connection;
pub mod dto;
pub mod mailer;
pub mod maintenance;
pub mod password_reset;
pub mod password_setup;
pub mod refresh_tokens;
pub mod sessions;
pub mod token_blacklist;

pub use error::{AppError, Result};

use crate::{
    config::AppConfig,
    connection::{ConnectionGuard, GuardConfig, HealthSnapshot},
    mailer::Mailer,
    token_blacklist::TokenBlacklist,
};

/// Application state shared across all service calls.
#[derive(Clone)]
pub struct AppState {
    /// Sole gateway to the credential store
    pub guard:     ConnectionGuard,
    /// Token minting and verification
    pub codec:     TokenCodec,
    /// Access-token revocation service
    pub blacklist: TokenBlacklist,
    /// Validated application configuration
    pub config:    AppConfig,
    /// Email delivery collaborator (best-effort)
    pub mailer:    Arc<dyn Mailer>,
}

impl AppState {
    /// Builds the application state from a loaded configuration.
    ///
    /// The database connection is established lazily on first
    /// [`ConnectionGuard::acquire`].
    #[must_use]
    pub fn new(config: AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        let guard = ConnectionGuard::new(
            config.database.url(),
            GuardConfig {
                failure_threshold: config.breaker.failure_threshold,
                cooldown:          std::time::Duration::from_secs(config.breaker.cooldown_secs),
                connect_timeout:   std::time::Duration::from_secs(config.database.connect_timeout_secs),
                pool_size:         config.database.pool_size,
            },
        );

        Self {
            guard,
            codec: TokenCodec::new(config.tokens.clone()),
            blacklist: TokenBlacklist::new(),
            config,
            mailer,
        }
    }

    /// Read-only health snapshot of the database guard, for readiness
    /// checks in the external layer.
    #[must_use]
    pub fn health(&self) -> HealthSnapshot { self.guard.health() }
}
