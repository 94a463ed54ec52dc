// Authentication-specific error handling utilities

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use thiserror::Error;

/// Authentication-specific errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Too many verification code requests")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Invalid or expired verification code")]
    InvalidCode,

    #[error("Failed to deliver verification code: {0}")]
    DeliveryFailed(String),

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("{0}")]
    Conflict(String),

    #[error("Account is deactivated")]
    AccountInactive,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal server error")]
    InternalError,
}

/// Standard error response structure
#[derive(Debug, Serialize)]
pub struct AuthErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl AuthError {
    /// Convert to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthError::InvalidCode => StatusCode::BAD_REQUEST,
            AuthError::DeliveryFailed(_) => StatusCode::BAD_GATEWAY,
            AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::Conflict(_) => StatusCode::CONFLICT,
            AuthError::AccountInactive => StatusCode::FORBIDDEN,
            AuthError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert to error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::RateLimited { .. } => "RATE_LIMITED",
            AuthError::InvalidCode => "INVALID_CODE",
            AuthError::DeliveryFailed(_) => "DELIVERY_FAILED",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::Conflict(_) => "CONFLICT",
            AuthError::AccountInactive => "ACCOUNT_INACTIVE",
            AuthError::ValidationError(_) => "VALIDATION_ERROR",
            AuthError::Forbidden => "FORBIDDEN",
            AuthError::Unauthorized => "UNAUTHORIZED",
            AuthError::DatabaseError(_) => "DATABASE_ERROR",
            AuthError::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Get retry_after value if applicable
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            AuthError::RateLimited {
                retry_after_seconds,
            } => Some(*retry_after_seconds),
            _ => None,
        }
    }

    /// Text safe to show a client; storage details stay in the logs
    fn public_description(&self) -> String {
        match self {
            AuthError::DatabaseError(_) => "Internal server error".to_string(),
            AuthError::DeliveryFailed(_) => "Failed to deliver verification code".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Authentication request failed");
        }

        let description = self.public_description();
        let response = AuthErrorResponse {
            success: false,
            error: ErrorDetail {
                code: self.error_code().to_string(),
                description: description.clone(),
                retry_after: self.retry_after(),
            },
            message: description,
        };

        (status, Json(response)).into_response()
    }
}

impl From<diesel::result::Error> for AuthError {
    fn from(error: diesel::result::Error) -> Self {
        AuthError::DatabaseError(error.to_string())
    }
}

impl From<redis::RedisError> for AuthError {
    fn from(error: redis::RedisError) -> Self {
        AuthError::DatabaseError(format!("cache: {}", error))
    }
}

impl From<crate::utils::phone::PhoneError> for AuthError {
    fn from(error: crate::utils::phone::PhoneError) -> Self {
        AuthError::ValidationError(error.to_string())
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(error: validator::ValidationErrors) -> Self {
        AuthError::ValidationError(error.to_string())
    }
}

impl From<bb8::RunError<diesel_async::pooled_connection::PoolError>> for AuthError {
    fn from(error: bb8::RunError<diesel_async::pooled_connection::PoolError>) -> Self {
        AuthError::DatabaseError(format!("pool: {}", error))
    }
}

impl From<crate::models::UserError> for AuthError {
    fn from(error: crate::models::UserError) -> Self {
        use crate::models::UserError;
        match error {
            UserError::NotFound => AuthError::InvalidToken,
            UserError::PhoneTaken => {
                AuthError::Conflict("Phone number already registered".to_string())
            },
            UserError::Database(e) => AuthError::DatabaseError(e.to_string()),
        }
    }
}

impl From<crate::services::otp::OtpError> for AuthError {
    fn from(error: crate::services::otp::OtpError) -> Self {
        use crate::services::otp::OtpError;
        match error {
            OtpError::RateLimited {
                retry_after_seconds,
            } => AuthError::RateLimited {
                retry_after_seconds,
            },
            OtpError::InvalidCode => AuthError::InvalidCode,
            OtpError::RedisError(e) => AuthError::DatabaseError(format!("cache: {}", e)),
        }
    }
}

impl From<crate::services::jwt::JwtError> for AuthError {
    fn from(error: crate::services::jwt::JwtError) -> Self {
        use crate::services::jwt::JwtError;
        match error {
            JwtError::TokenExpired | JwtError::InvalidToken | JwtError::WrongTokenType => {
                AuthError::InvalidToken
            },
            other => {
                tracing::error!("Token service failure: {}", other);
                AuthError::InternalError
            },
        }
    }
}

impl From<crate::services::sms::SmsError> for AuthError {
    fn from(error: crate::services::sms::SmsError) -> Self {
        AuthError::DeliveryFailed(error.to_string())
    }
}

/// Log an authentication failure against a masked phone number
pub fn log_auth_failure(phone: &str, error: &AuthError) {
    tracing::warn!(
        phone = %crate::utils::phone::mask_phone(phone),
        error_code = error.error_code(),
        "Authentication failure"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AuthError::RateLimited {
                retry_after_seconds: 10
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(AuthError::InvalidToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::Conflict("taken".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(AuthError::AccountInactive.to_string(), "Account is deactivated");
    }

    #[test]
    fn test_retry_after_only_for_rate_limit() {
        assert_eq!(
            AuthError::RateLimited {
                retry_after_seconds: 42
            }
            .retry_after(),
            Some(42)
        );
        assert_eq!(AuthError::InvalidCode.retry_after(), None);
    }

    #[test]
    fn test_database_detail_not_exposed() {
        let err = AuthError::DatabaseError("relation users does not exist".into());
        assert_eq!(err.public_description(), "Internal server error");
    }
}
