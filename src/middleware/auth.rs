// Request-scoped identities resolved from the bearer token

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::app::AppState;
use crate::models::{Merchant, User, UserType};
use crate::utils::AuthError;

/// Active user behind a valid access token; inserted by `auth_middleware`
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
}

impl AuthenticatedUser {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn role(&self) -> Option<UserType> {
        self.user.role()
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(AuthError::Unauthorized)
    }
}

/// Authenticated merchant-role user together with their merchant profile
#[derive(Debug, Clone)]
pub struct CurrentMerchant {
    pub user: User,
    pub merchant: Merchant,
}

impl FromRequestParts<AppState> for CurrentMerchant {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser { user } =
            AuthenticatedUser::from_request_parts(parts, state).await?;

        if !user.is_merchant() {
            return Err(AuthError::Forbidden);
        }

        let mut conn = state.diesel_pool.get().await?;
        let merchant = Merchant::find_by_user_id(&mut conn, user.id)
            .await?
            .ok_or(AuthError::Forbidden)?;

        Ok(CurrentMerchant { user, merchant })
    }
}
