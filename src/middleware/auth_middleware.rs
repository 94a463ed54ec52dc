// Authentication middleware for protected routes
// Validates the bearer token and injects AuthenticatedUser into request extensions

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{app::AppState, middleware::auth::AuthenticatedUser, utils::AuthError};

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(value: Option<&str>) -> Option<&str> {
    let value = value?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Middleware function that resolves the bearer token to an active user
pub async fn auth_middleware(
    State(app_state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let Some(token) = bearer_token(auth_header).map(str::to_string) else {
        return AuthError::Unauthorized.into_response();
    };

    match app_state.auth_service.authenticate(&token).await {
        Ok(user) => {
            request.extensions_mut().insert(AuthenticatedUser { user });
            next.run(request).await
        },
        Err(e) => {
            tracing::warn!("Bearer authentication failed: {}", e);
            e.into_response()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(Some("bearer  abc ")), Some("abc"));
        assert_eq!(bearer_token(Some("Basic abc")), None);
        assert_eq!(bearer_token(Some("Bearer ")), None);
        assert_eq!(bearer_token(None), None);
    }
}
