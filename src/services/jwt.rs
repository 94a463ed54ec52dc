// Bearer token minting and validation
// One HMAC secret signs both token kinds; the `type` claim tells them apart.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

use crate::models::auth::{TokenClaims, TokenType};

#[derive(Error, Debug)]
pub enum JwtError {
    #[error("JWT encoding error: {0}")]
    EncodingError(String),

    #[error("Unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Clock error: {0}")]
    ClockError(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Wrong token type")]
    WrongTokenType,
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::TokenExpired,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::MissingRequiredClaim(_)
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => JwtError::InvalidToken,
            _ => JwtError::EncodingError(err.to_string()),
        }
    }
}

/// Access/refresh pair handed to a client after login, registration or refresh
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
}

#[derive(Clone)]
pub struct JwtConfig {
    pub access_token_expiry: u64,  // seconds
    pub refresh_token_expiry: u64, // seconds
    pub algorithm: Algorithm,
    pub encoding_key: EncodingKey,
    pub decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_token_expiry", &self.access_token_expiry)
            .field("refresh_token_expiry", &self.refresh_token_expiry)
            .field("algorithm", &self.algorithm)
            .field("encoding_key", &"<redacted>")
            .field("decoding_key", &"<redacted>")
            .finish()
    }
}

fn parse_algorithm(name: &str) -> Result<Algorithm, JwtError> {
    match name.to_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => Err(JwtError::UnsupportedAlgorithm(other.to_string())),
    }
}

impl JwtConfig {
    fn build_from_params(
        secret: &str,
        algorithm: Algorithm,
        access_expiry: u64,
        refresh_expiry: u64,
    ) -> Self {
        JwtConfig {
            access_token_expiry: access_expiry,
            refresh_token_expiry: refresh_expiry,
            algorithm,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Token policy from the application configuration
    pub fn from_app_config(config: &crate::app_config::AuthConfig) -> Result<Self, JwtError> {
        let crate::app_config::AuthConfig {
            secret_key,
            algorithm,
            access_token_expire_minutes,
            refresh_token_expire_days,
        } = config;

        Ok(Self::build_from_params(
            secret_key,
            parse_algorithm(algorithm)?,
            access_token_expire_minutes * 60,
            refresh_token_expire_days * 24 * 60 * 60,
        ))
    }

    /// Deterministic config for tests
    pub fn for_test() -> Self {
        Self::build_from_params(
            "test-signing-secret-for-wedy-backend-hs256",
            Algorithm::HS256,
            15 * 60,
            30 * 24 * 60 * 60,
        )
    }
}

pub struct JwtService {
    config: JwtConfig,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        Self { config }
    }

    /// Access token lifetime in seconds, reported to clients as `expires_in`
    pub fn access_token_ttl(&self) -> u64 {
        self.config.access_token_expiry
    }

    fn now() -> Result<u64, JwtError> {
        Ok(SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| JwtError::ClockError(e.to_string()))?
            .as_secs())
    }

    fn sign(&self, user_id: &str, token_type: TokenType, ttl: u64) -> Result<String, JwtError> {
        let now = Self::now()?;
        let claims = TokenClaims {
            sub: user_id.to_string(),
            token_type,
            iat: now,
            exp: now + ttl,
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(self.config.algorithm), &claims, &self.config.encoding_key)
            .map_err(Into::into)
    }

    pub fn generate_access_token(&self, user_id: &str) -> Result<String, JwtError> {
        self.sign(user_id, TokenType::Access, self.config.access_token_expiry)
    }

    pub fn generate_refresh_token(&self, user_id: &str) -> Result<String, JwtError> {
        self.sign(user_id, TokenType::Refresh, self.config.refresh_token_expiry)
    }

    pub fn issue_pair(&self, user_id: &str) -> Result<TokenPair, JwtError> {
        Ok(TokenPair {
            access_token: self.generate_access_token(user_id)?,
            refresh_token: self.generate_refresh_token(user_id)?,
            expires_in: self.config.access_token_expiry,
        })
    }

    /// Decode and check signature and expiry with no leeway, then require the given type
    pub fn validate(&self, token: &str, expected: TokenType) -> Result<TokenClaims, JwtError> {
        let mut validation = Validation::new(self.config.algorithm);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let token_data = decode::<TokenClaims>(token, &self.config.decoding_key, &validation)?;
        if token_data.claims.token_type != expected {
            return Err(JwtError::WrongTokenType);
        }

        Ok(token_data.claims)
    }

    pub fn validate_access_token(&self, token: &str) -> Result<TokenClaims, JwtError> {
        self.validate(token, TokenType::Access)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<TokenClaims, JwtError> {
        self.validate(token, TokenType::Refresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_round_trip() {
        let service = JwtService::new(JwtConfig::for_test());

        let token = service.generate_access_token("user-42").unwrap();
        let claims = service.validate_access_token(&token).unwrap();

        assert_eq!(claims.sub, "user-42");
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let service = JwtService::new(JwtConfig::for_test());
        let pair = service.issue_pair("user-42").unwrap();

        assert!(matches!(
            service.validate_access_token(&pair.refresh_token),
            Err(JwtError::WrongTokenType)
        ));
        assert!(matches!(
            service.validate_refresh_token(&pair.access_token),
            Err(JwtError::WrongTokenType)
        ));
        assert_eq!(
            service.validate_refresh_token(&pair.refresh_token).unwrap().sub,
            "user-42"
        );
        assert_eq!(pair.expires_in, 900);
    }

    #[test]
    fn test_expired_token_rejected() {
        let mut config = JwtConfig::for_test();
        config.access_token_expiry = 0;
        let service = JwtService::new(config);

        let token = service.generate_access_token("user-42").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));

        assert!(matches!(
            service.validate_access_token(&token),
            Err(JwtError::TokenExpired)
        ));
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let service = JwtService::new(JwtConfig::for_test());
        let other = JwtService::new(JwtConfig::build_from_params(
            "another-secret-entirely-another-secret",
            Algorithm::HS256,
            900,
            900,
        ));

        let token = other.generate_access_token("user-42").unwrap();
        assert!(matches!(
            service.validate_access_token(&token),
            Err(JwtError::InvalidToken)
        ));
        assert!(matches!(
            service.validate_access_token("not-a-jwt"),
            Err(JwtError::InvalidToken)
        ));
    }

    #[test]
    fn test_parse_algorithm() {
        assert_eq!(parse_algorithm("hs384").unwrap(), Algorithm::HS384);
        assert!(parse_algorithm("RS256").is_err());
    }
}
