// Authentication handlers: OTP login, registration, token refresh, profile

use axum::{extract::State, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    middleware::auth::AuthenticatedUser,
    services::jwt::TokenPair,
    utils::auth_errors::AuthError,
};

// =============================================================================
// REQUEST/RESPONSE TYPES
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct SendOtpRequest {
    #[validate(length(min = 9, max = 20, message = "Phone number must be 9 to 20 characters"))]
    pub phone: String,
}

#[derive(Debug, Serialize)]
pub struct SendOtpResponse {
    pub message: String,
    pub phone_number: String,
    /// Minutes until the code expires
    pub expires_in: u64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(length(min = 9, max = 20, message = "Phone number must be 9 to 20 characters"))]
    pub phone: String,
    #[validate(length(equal = 6, message = "Code must be 6 digits"))]
    pub otp_code: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyOtpResponse {
    pub is_new_user: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    pub message: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CompleteRegistrationRequest {
    #[validate(length(min = 9, max = 20, message = "Phone number must be 9 to 20 characters"))]
    pub phone: String,
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub name: String,
    pub user_type: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Seconds until the access token expires
    pub expires_in: u64,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "bearer",
            expires_in: pair.expires_in,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub phone_number: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub user_type: String,
    pub is_active: bool,
    pub merchant_id: Option<Uuid>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

// =============================================================================
// HANDLERS
// =============================================================================

/// POST /auth/send-otp
pub async fn send_otp(
    State(state): State<AppState>,
    Json(request): Json<SendOtpRequest>,
) -> Result<impl IntoResponse, AuthError> {
    request.validate()?;

    let issued = state.auth_service.issue_code(&request.phone).await?;

    Ok(Json(SendOtpResponse {
        message: "Verification code sent".to_string(),
        phone_number: issued.phone_normalized,
        expires_in: issued.ttl_minutes,
    }))
}

// A malformed phone is a validation error; a malformed code reads like a wrong one
fn verify_request_error(errors: validator::ValidationErrors) -> AuthError {
    if errors.field_errors().contains_key("phone") {
        AuthError::from(errors)
    } else {
        AuthError::InvalidCode
    }
}

/// POST /auth/verify-otp
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<impl IntoResponse, AuthError> {
    request.validate().map_err(verify_request_error)?;

    let outcome = state
        .auth_service
        .verify_code(&request.phone, &request.otp_code)
        .await?;

    let response = match outcome.tokens {
        Some(tokens) => VerifyOtpResponse {
            is_new_user: false,
            access_token: Some(tokens.access_token),
            refresh_token: Some(tokens.refresh_token),
            token_type: "bearer",
            expires_in: Some(tokens.expires_in),
            message: "Signed in".to_string(),
        },
        None => VerifyOtpResponse {
            is_new_user: outcome.is_new,
            access_token: None,
            refresh_token: None,
            token_type: "bearer",
            expires_in: None,
            message: "Phone verified, complete registration".to_string(),
        },
    };

    Ok(Json(response))
}

/// POST /auth/complete-registration
pub async fn complete_registration(
    State(state): State<AppState>,
    Json(request): Json<CompleteRegistrationRequest>,
) -> Result<impl IntoResponse, AuthError> {
    request.validate()?;

    let tokens = state
        .auth_service
        .complete_registration(&request.phone, &request.name, &request.user_type)
        .await?;

    Ok(Json(TokenResponse::from(tokens)))
}

/// POST /auth/refresh
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AuthError> {
    if request.refresh_token.split('.').count() != 3 {
        return Err(AuthError::InvalidToken);
    }

    let tokens = state.auth_service.refresh(&request.refresh_token).await?;
    Ok(Json(TokenResponse::from(tokens)))
}

/// GET /auth/me
pub async fn get_current_user(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
) -> Result<impl IntoResponse, AuthError> {
    let profile = state.auth_service.profile(auth_user.user).await?;
    let user = profile.user;

    Ok(Json(UserInfo {
        id: user.id,
        phone_number: user.phone_number,
        name: user.name,
        avatar_url: user.avatar_url,
        user_type: user.user_type,
        is_active: user.is_active,
        merchant_id: profile.merchant.map(|m| m.id),
        created_at: user.created_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_response_omits_tokens_for_new_user() {
        let response = VerifyOtpResponse {
            is_new_user: true,
            access_token: None,
            refresh_token: None,
            token_type: "bearer",
            expires_in: None,
            message: "Phone verified, complete registration".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["is_new_user"], true);
        assert!(json.get("access_token").is_none());
        assert!(json.get("expires_in").is_none());
    }

    #[test]
    fn test_request_validation() {
        let ok = VerifyOtpRequest {
            phone: "901234567".to_string(),
            otp_code: "123456".to_string(),
        };
        assert!(ok.validate().is_ok());

        let short = VerifyOtpRequest {
            phone: "901234567".to_string(),
            otp_code: "123".to_string(),
        };
        assert!(short.validate().is_err());
    }

    #[test]
    fn test_verify_request_error_classification() {
        let bad_phone = VerifyOtpRequest {
            phone: "123".to_string(),
            otp_code: "12".to_string(),
        };
        let err = verify_request_error(bad_phone.validate().unwrap_err());
        assert!(matches!(err, AuthError::ValidationError(_)));
        assert_eq!(err.error_code(), "VALIDATION_ERROR");

        let bad_code = VerifyOtpRequest {
            phone: "901234567".to_string(),
            otp_code: "12".to_string(),
        };
        let err = verify_request_error(bad_code.validate().unwrap_err());
        assert!(matches!(err, AuthError::InvalidCode));
    }

    #[test]
    fn test_token_response_from_pair() {
        let response = TokenResponse::from(TokenPair {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_in: 1800,
        });
        assert_eq!(response.token_type, "bearer");
        assert_eq!(response.expires_in, 1800);
    }
}
