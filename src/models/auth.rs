// Bearer token claims

use serde::{Deserialize, Serialize};

/// Which half of the token pair a JWT represents
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// Claims carried by both access and refresh tokens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    /// User ID (subject)
    pub sub: String,

    /// Token kind; a refresh token is never accepted where an access token is expected
    #[serde(rename = "type")]
    pub token_type: TokenType,

    /// Issued at (Unix epoch seconds)
    pub iat: u64,

    /// Expires at (Unix epoch seconds)
    pub exp: u64,

    /// Unique token id
    pub jti: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_claim_serializes_lowercase() {
        let claims = TokenClaims {
            sub: "user-1".to_string(),
            token_type: TokenType::Refresh,
            iat: 1,
            exp: 2,
            jti: "j".to_string(),
        };

        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["type"], "refresh");
        assert_eq!(json["sub"], "user-1");
    }
}
