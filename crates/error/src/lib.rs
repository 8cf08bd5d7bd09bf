//! # Gatehouse Error Infrastructure
//!
//! Error taxonomy shared by every crate in the workspace. Authentication
//! failures deliberately carry no detail that would distinguish "no such
//! user" from "wrong password", and no error message ever exposes SQL text
//! or internal state to callers.

pub mod response;

pub use response::ErrorBody;

/// Convenience type alias for Result with AppError.
pub type Result<T, E = AppError> = std::result::Result<T, E>;

/// Main application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The data store is unreachable or the connection breaker is open.
    /// Retryable by the caller once `retry_after` seconds have passed.
    #[error("Unavailable: {message}")]
    Unavailable {
        message:     String,
        retry_after: u64,
    },

    /// Credential mismatch. One fixed message for every cause.
    #[error("InvalidCredentials: email or password is incorrect")]
    InvalidCredentials,

    /// Expired, malformed, revoked, or unknown token. Token-shape failures
    /// (expired / malformed / wrong kind) collapse into this variant at the
    /// service boundary.
    #[error("InvalidToken: {message}")]
    InvalidToken {
        message: String,
    },

    /// Policy rejection with a retry-after hint in seconds.
    #[error("RateLimited: {message}")]
    RateLimited {
        message:     String,
        retry_after: u64,
    },

    #[error("Conflict: {message}")]
    Conflict {
        message: String,
    },

    #[error("NotFound: {message}")]
    NotFound {
        message: String,
    },

    #[error("Validation: {message}")]
    Validation {
        message: String,
    },

    #[error("Database: {message}")]
    Database {
        message: String,
    },

    #[error("Config: {message}")]
    Config {
        message: String,
    },

    #[error("Migration: {message}")]
    Migration {
        message: String,
    },

    #[error("Internal: {message}")]
    Internal {
        message: String,
    },

    #[error("IO: {message}")]
    Io {
        message: String,
    },
}

impl AppError {
    /// Create an unavailability error with a retry-after hint.
    #[inline]
    pub fn unavailable(message: impl ToString, retry_after: u64) -> Self {
        Self::Unavailable {
            message: message.to_string(),
            retry_after,
        }
    }

    /// Create an invalid-token error.
    #[inline]
    pub fn invalid_token(message: impl ToString) -> Self {
        Self::InvalidToken {
            message: message.to_string(),
        }
    }

    /// Create a rate-limit error.
    #[inline]
    pub fn rate_limited(message: impl ToString, retry_after: u64) -> Self {
        Self::RateLimited {
            message: message.to_string(),
            retry_after,
        }
    }

    /// Create a conflict error.
    #[inline]
    pub fn conflict(message: impl ToString) -> Self {
        Self::Conflict {
            message: message.to_string(),
        }
    }

    /// Create a not found error.
    #[inline]
    pub fn not_found(message: impl ToString) -> Self {
        Self::NotFound {
            message: message.to_string(),
        }
    }

    /// Create a validation error.
    #[inline]
    pub fn validation(message: impl ToString) -> Self {
        Self::Validation {
            message: message.to_string(),
        }
    }

    /// Create a database error.
    #[inline]
    pub fn database(message: impl ToString) -> Self {
        Self::Database {
            message: message.to_string(),
        }
    }

    /// Create a config error.
    #[inline]
    pub fn config(message: impl ToString) -> Self {
        Self::Config {
            message: message.to_string(),
        }
    }

    /// Create a migration error.
    #[inline]
    pub fn migration(message: impl ToString) -> Self {
        Self::Migration {
            message: message.to_string(),
        }
    }

    /// Create an internal error.
    #[inline]
    pub fn internal(message: impl ToString) -> Self {
        Self::Internal {
            message: message.to_string(),
        }
    }

    /// Get the HTTP status code for the external HTTP layer.
    pub fn status(&self) -> http::StatusCode {
        match self {
            AppError::Unavailable { .. } => http::StatusCode::SERVICE_UNAVAILABLE,
            AppError::InvalidCredentials => http::StatusCode::UNAUTHORIZED,
            AppError::InvalidToken { .. } => http::StatusCode::UNAUTHORIZED,
            AppError::RateLimited { .. } => http::StatusCode::TOO_MANY_REQUESTS,
            AppError::Conflict { .. } => http::StatusCode::CONFLICT,
            AppError::NotFound { .. } => http::StatusCode::NOT_FOUND,
            AppError::Validation { .. } => http::StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Database { .. }
            | AppError::Config { .. }
            | AppError::Migration { .. }
            | AppError::Internal { .. }
            | AppError::Io { .. } => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the stable error code.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unavailable { .. } => "UNAVAILABLE",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::InvalidToken { .. } => "INVALID_TOKEN",
            AppError::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            AppError::Conflict { .. } => "CONFLICT",
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::Database { .. } => "DATABASE_ERROR",
            AppError::Config { .. } => "CONFIG_ERROR",
            AppError::Migration { .. } => "MIGRATION_ERROR",
            AppError::Internal { .. } => "INTERNAL_ERROR",
            AppError::Io { .. } => "IO_ERROR",
        }
    }

    /// Get the user-safe error message.
    pub fn message(&self) -> String {
        match self {
            AppError::InvalidCredentials => "Email or password is incorrect".to_string(),
            AppError::Unavailable { message, .. }
            | AppError::InvalidToken { message }
            | AppError::RateLimited { message, .. }
            | AppError::Conflict { message }
            | AppError::NotFound { message }
            | AppError::Validation { message }
            | AppError::Database { message }
            | AppError::Config { message }
            | AppError::Migration { message }
            | AppError::Internal { message }
            | AppError::Io { message } => message.clone(),
        }
    }

    /// Retry-after hint in seconds, when the error carries one.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            AppError::Unavailable { retry_after, .. } | AppError::RateLimited { retry_after, .. } => {
                Some(*retry_after)
            },
            _ => None,
        }
    }

    /// True when the caller may retry after waiting.
    pub fn is_retryable(&self) -> bool { self.retry_after().is_some() }
}

/// Convert Sea-ORM database errors to AppError.
///
/// Connection-level failures are surfaced by the connection guard before a
/// query runs, so everything arriving here is a plain database error.
impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database {
            message: err.to_string(),
        }
    }
}

/// Convert anyhow errors to AppError.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal {
            message: err.to_string(),
        }
    }
}

/// Convert std::io errors to AppError.
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

/// Convert validator errors to AppError.
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = err
            .field_errors()
            .iter()
            .flat_map(|(_, errors)| {
                errors
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| "Invalid value".to_string())
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        let message = if messages.is_empty() {
            "Validation failed".to_string()
        }
        else {
            messages.join(", ")
        };

        Self::Validation {
            message,
        }
    }
}
