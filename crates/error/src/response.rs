//! Wire-format error body handed to the external HTTP layer.

use serde::Serialize;

use crate::AppError;

/// Serializable error body. The HTTP collaborator pairs this with
/// [`AppError::status`] to build its response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub code:    String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl From<&AppError> for ErrorBody {
    fn from(err: &AppError) -> Self {
        Self {
            success:     false,
            code:        err.code().to_string(),
            message:     err.message(),
            retry_after: err.retry_after(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_shape() {
        let err = AppError::rate_limited("Too many setup attempts", 86400);
        let body = ErrorBody::from(&err);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "RATE_LIMIT_EXCEEDED");
        assert_eq!(json["retry_after"], 86400);
    }

    #[test]
    fn test_error_body_omits_absent_retry_after() {
        let err = AppError::InvalidCredentials;
        let json = serde_json::to_value(ErrorBody::from(&err)).unwrap();

        assert!(json.get("retry_after").is_none());
        assert_eq!(json["code"], "INVALID_CREDENTIALS");
    }
}
