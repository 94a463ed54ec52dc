// HTTP handlers and per-area route builders

pub mod auth;
pub mod callbacks;
pub mod merchants;
pub mod payme;
pub mod payments;
pub mod tariffs;

use crate::{app::AppState, middleware::auth_middleware};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use serde::Serialize;

/// Success envelope for the marketplace endpoints
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub message: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: message.into(),
        }
    }
}

// Authentication routes; only /me needs a bearer token
pub fn auth_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/me", get(auth::get_current_user))
        .route_layer(from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/send-otp", post(auth::send_otp))
        .route("/verify-otp", post(auth::verify_otp))
        .route("/complete-registration", post(auth::complete_registration))
        .route("/refresh", post(auth::refresh_token))
        .merge(protected)
}

pub fn tariff_routes() -> Router<AppState> {
    Router::new().route("/", get(tariffs::list_tariffs))
}

pub fn payment_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/tariff", post(payments::create_tariff_payment))
        .route("/featured", post(payments::create_featured_payment))
        .route("/{id}", get(payments::get_payment))
        .route_layer(from_fn_with_state(state, auth_middleware))
}

pub fn merchant_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/me/subscription", get(merchants::my_subscription))
        .route("/me/quota/{action}", get(merchants::check_quota))
        .route("/me/featured/free", post(merchants::grant_free_feature))
        .route_layer(from_fn_with_state(state, auth_middleware))
}

// Server-to-server provider callbacks authenticate by credential or signature, not bearer
pub fn provider_routes() -> Router<AppState> {
    Router::new()
        .route("/payme/merchant", post(payme::payme_merchant))
        .route("/payments/click/prepare", post(callbacks::click_callback))
        .route("/payments/click/complete", post(callbacks::click_callback))
        .route("/payments/uzum/callback", post(callbacks::uzum_callback))
}
