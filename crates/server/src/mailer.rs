//! # Mailer Seam
//!
//! The email delivery collaborator is external to this core: it receives a
//! pre-built reset/setup URL and nothing else. Delivery is best-effort by
//! contract — token issuance is the source of truth, so callers log a
//! failed send and move on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

/// Errors surfaced by a mailer implementation.
#[derive(Debug, Error)]
pub enum MailerError {
    #[error("Email delivery failed: {0}")]
    Delivery(String),
}

/// Email delivery interface handed to the flows.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends a password-reset email carrying the reset URL.
    async fn send_password_reset(
        &self,
        to: &str,
        name: &str,
        reset_url: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), MailerError>;

    /// Sends a password-setup email carrying the setup URL.
    async fn send_password_setup(
        &self,
        to: &str,
        name: &str,
        setup_url: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), MailerError>;
}

/// Mailer that logs instead of sending. Used in tests and as the default
/// until real delivery is wired up. The URL carries the raw token, so it
/// is deliberately not logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset(
        &self,
        to: &str,
        _name: &str,
        _reset_url: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), MailerError> {
        info!(to = %to, expires_at = %expires_at, "Password reset email (log-only mailer)");
        Ok(())
    }

    async fn send_password_setup(
        &self,
        to: &str,
        _name: &str,
        _setup_url: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), MailerError> {
        info!(to = %to, expires_at = %expires_at, "Password setup email (log-only mailer)");
        Ok(())
    }
}
