// Error type shared by the merchant, quota and payment endpoints
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::payment::PaymentError;
use crate::services::quota::QuotaError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("An active subscription is required")]
    SubscriptionRequired,

    #[error("{limit_type} limit reached ({current}/{max_allowed}) on tariff {tier_name}")]
    QuotaExceeded {
        limit_type: String,
        current: i64,
        max_allowed: i64,
        tier_name: String,
    },

    #[error("Tariff {tier_name} does not include {feature}")]
    FeatureForbidden { feature: String, tier_name: String },

    #[error("Payment provider error: {0}")]
    ProviderError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Internal server error")]
    InternalError,
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::SubscriptionRequired => StatusCode::PAYMENT_REQUIRED,
            ServiceError::QuotaExceeded { .. } => StatusCode::FORBIDDEN,
            ServiceError::FeatureForbidden { .. } => StatusCode::FORBIDDEN,
            ServiceError::ProviderError(_) => StatusCode::BAD_GATEWAY,
            ServiceError::DatabaseError(_)
            | ServiceError::CacheError(_)
            | ServiceError::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::ValidationError(_) => "VALIDATION_ERROR",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Unauthorized => "UNAUTHORIZED",
            ServiceError::Forbidden(_) => "FORBIDDEN",
            ServiceError::Conflict(_) => "CONFLICT",
            ServiceError::SubscriptionRequired => "SUBSCRIPTION_REQUIRED",
            ServiceError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            ServiceError::FeatureForbidden { .. } => "FEATURE_NOT_AVAILABLE",
            ServiceError::ProviderError(_) => "PROVIDER_ERROR",
            ServiceError::DatabaseError(_) => "DATABASE_ERROR",
            ServiceError::CacheError(_) => "CACHE_ERROR",
            ServiceError::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Storage and provider internals stay in the logs
        let description = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            match self {
                ServiceError::ProviderError(_) => "Payment provider unavailable".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            self.to_string()
        };

        let mut error = json!({
            "code": self.error_code(),
            "description": description,
        });

        match &self {
            ServiceError::QuotaExceeded {
                limit_type,
                current,
                max_allowed,
                tier_name,
            } => {
                error["details"] = json!({
                    "limit_type": limit_type,
                    "current": current,
                    "max_allowed": max_allowed,
                    "tier_name": tier_name,
                });
            },
            ServiceError::FeatureForbidden { feature, tier_name } => {
                error["details"] = json!({
                    "feature": feature,
                    "tier_name": tier_name,
                });
            },
            _ => {},
        }

        let body = Json(json!({
            "success": false,
            "error": error,
            "message": description,
        }));

        (status, body).into_response()
    }
}

// Conversion from various error types
impl From<diesel::result::Error> for ServiceError {
    fn from(error: diesel::result::Error) -> Self {
        match error {
            diesel::result::Error::NotFound => ServiceError::NotFound("Resource".to_string()),
            _ => ServiceError::DatabaseError(error.to_string()),
        }
    }
}

impl From<redis::RedisError> for ServiceError {
    fn from(error: redis::RedisError) -> Self {
        ServiceError::CacheError(error.to_string())
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(error: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(error.to_string())
    }
}

impl From<bb8::RunError<diesel_async::pooled_connection::PoolError>> for ServiceError {
    fn from(error: bb8::RunError<diesel_async::pooled_connection::PoolError>) -> Self {
        ServiceError::DatabaseError(format!("pool: {}", error))
    }
}

impl From<QuotaError> for ServiceError {
    fn from(error: QuotaError) -> Self {
        match error {
            QuotaError::SubscriptionRequired => ServiceError::SubscriptionRequired,
            QuotaError::QuotaExceeded {
                limit_type,
                current,
                max_allowed,
                tier_name,
            } => ServiceError::QuotaExceeded {
                limit_type: limit_type.as_str().to_string(),
                current,
                max_allowed,
                tier_name,
            },
            QuotaError::FeatureForbidden { feature, tier_name } => ServiceError::FeatureForbidden {
                feature: feature.to_string(),
                tier_name,
            },
            QuotaError::ServiceNotFound(_) => ServiceError::NotFound("Service".to_string()),
            QuotaError::Database(e) => ServiceError::DatabaseError(e.to_string()),
            QuotaError::Pool(e) => ServiceError::DatabaseError(e),
        }
    }
}

impl From<PaymentError> for ServiceError {
    fn from(error: PaymentError) -> Self {
        match error {
            PaymentError::Validation(msg) => ServiceError::ValidationError(msg),
            PaymentError::NotFound(what) => ServiceError::NotFound(what),
            PaymentError::Forbidden(msg) => ServiceError::Forbidden(msg),
            PaymentError::UnsupportedMethod(method) => {
                ServiceError::ValidationError(format!("Unsupported payment method: {}", method))
            },
            PaymentError::Provider(msg) => ServiceError::ProviderError(msg),
            PaymentError::InvalidSignature => {
                ServiceError::Forbidden("Invalid callback signature".to_string())
            },
            PaymentError::Database(e) => ServiceError::DatabaseError(e.to_string()),
            PaymentError::Pool(msg) => ServiceError::DatabaseError(msg),
            PaymentError::Internal(msg) => {
                tracing::error!("Payment internal error: {}", msg);
                ServiceError::InternalError
            },
        }
    }
}
