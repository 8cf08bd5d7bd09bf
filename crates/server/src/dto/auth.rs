//! # Authentication Data Transfer Objects
//!
//! Typed inputs and outputs of the session manager. The HTTP layer
//! deserializes request bodies into these and serializes the responses.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request body for user registration
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(
        min = 12,
        max = 256,
        message = "Password must be between 12 and 256 characters"
    ))]
    pub password: String,

    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub name: String,
}

/// Request body for user login
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Request body for token refresh
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// Request body for single-device logout
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LogoutRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,

    /// The paired access token, blacklisted for its remaining lifetime.
    pub access_token: Option<String>,
}

/// User information returned after authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id:       String,
    pub email:    String,
    pub name:     String,
    pub is_admin: bool,
}

impl From<&entity::users::Model> for UserProfile {
    fn from(user: &entity::users::Model) -> Self {
        Self {
            id:       user.id.to_string(),
            email:    user.email.clone(),
            name:     user.name.clone(),
            is_admin: user.is_admin,
        }
    }
}

/// Response for login/register/refresh: the token pair plus expiry hints.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user: UserProfile,

    pub access_token:  String,
    pub refresh_token: String,

    /// Access-token lifetime in seconds
    pub expires_in: u64,

    /// Refresh-token lifetime in seconds
    pub refresh_expires_in: u64,
}

/// Generic success acknowledgement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

impl SuccessResponse {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// An active device session, as shown in a user's device list.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSession {
    pub device_id:  String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_signature: Option<String>,
}

impl From<&entity::refresh_tokens::Model> for DeviceSession {
    fn from(record: &entity::refresh_tokens::Model) -> Self {
        Self {
            device_id:        record.device_id.clone(),
            created_at:       record.created_at,
            expires_at:       record.expires_at,
            origin:           record.origin.clone(),
            client_signature: record.client_signature.clone(),
        }
    }
}
