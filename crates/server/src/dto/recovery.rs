//! Data transfer objects for the password reset and setup flows.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request body for initiating a password reset
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResetRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Request body for consuming a reset token
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,

    #[validate(length(
        min = 12,
        max = 256,
        message = "Password must be between 12 and 256 characters"
    ))]
    pub new_password: String,
}

/// Request body for consuming a setup token
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SetupPasswordRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,

    #[validate(length(
        min = 12,
        max = 256,
        message = "Password must be between 12 and 256 characters"
    ))]
    pub new_password: String,
}

/// Response of the read-only token validation endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryTokenInfo {
    pub email:      String,
    pub name:       String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}
