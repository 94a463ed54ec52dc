use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value as JsonValue;

use crate::{
    app::AppState,
    models::PaymentMethod,
    services::payment::{
        payme::{rpc_error, PaymeError},
        CallbackRequest,
    },
};

/// POST /payme/merchant
///
/// Every outcome is HTTP 200; protocol errors travel inside the JSON-RPC reply.
pub async fn payme_merchant(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match state.payment_service.providers().get(PaymentMethod::Payme) {
        Ok(provider) => provider
            .handle_method(CallbackRequest::new(headers, body))
            .await
            .into_response(),
        Err(e) => {
            tracing::error!("Payme provider unavailable: {}", e);
            Json(rpc_error(JsonValue::Null, &PaymeError::internal())).into_response()
        },
    }
}
