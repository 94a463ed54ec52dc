// Click and Uzumbank server-to-server callbacks

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{
    app::AppState,
    models::PaymentMethod,
    services::payment::CallbackRequest,
};

async fn dispatch(
    state: &AppState,
    method: PaymentMethod,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match state.payment_service.providers().get(method) {
        Ok(provider) => provider
            .handle_method(CallbackRequest::new(headers, body))
            .await
            .into_response(),
        Err(e) => {
            tracing::error!(method = method.as_str(), "Provider unavailable: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "success": false, "error": "Provider not configured" })),
            )
                .into_response()
        },
    }
}

/// POST /payments/click/prepare and /payments/click/complete
pub async fn click_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    dispatch(&state, PaymentMethod::Click, headers, body).await
}

/// POST /payments/uzum/callback
pub async fn uzum_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    dispatch(&state, PaymentMethod::Uzum, headers, body).await
}
