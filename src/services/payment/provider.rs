// Provider adapter surface shared by Payme, Click and Uzum

use async_trait::async_trait;
use axum::{
    body::Bytes,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::Value as JsonValue;

use super::PaymentError;
use crate::models::{Payment, PaymentMethod};

/// Where to send the payer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkout {
    pub payment_url: String,
}

/// Raw inbound provider callback
#[derive(Debug, Clone)]
pub struct CallbackRequest {
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CallbackRequest {
    pub fn new(headers: HeaderMap, body: Bytes) -> Self {
        Self { headers, body }
    }

    pub fn authorization(&self) -> Option<&str> {
        self.headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> Result<JsonValue, PaymentError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| PaymentError::Validation(format!("invalid JSON body: {}", e)))
    }

    /// Decode an `application/x-www-form-urlencoded` body
    pub fn form(&self) -> std::collections::BTreeMap<String, String> {
        url::form_urlencoded::parse(&self.body)
            .into_owned()
            .collect()
    }
}

/// Reply to a provider callback
#[derive(Debug, Clone)]
pub struct CallbackReply {
    pub status: StatusCode,
    pub body: JsonValue,
}

impl CallbackReply {
    pub fn ok(body: JsonValue) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    pub fn with_status(status: StatusCode, body: JsonValue) -> Self {
        Self { status, body }
    }
}

impl IntoResponse for CallbackReply {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Append an inbound request to the webhook log kept on the payment
pub fn append_webhook(existing: Option<&JsonValue>, entry: JsonValue) -> JsonValue {
    let mut log = match existing {
        Some(JsonValue::Array(items)) => items.clone(),
        Some(JsonValue::Null) | None => Vec::new(),
        Some(other) => vec![other.clone()],
    };
    log.push(entry);
    JsonValue::Array(log)
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn method(&self) -> PaymentMethod;

    /// Checkout artefact for a freshly created pending payment
    async fn build_checkout(&self, payment: &Payment) -> Result<Checkout, PaymentError>;

    /// Authenticate an inbound callback (credentials or signature)
    fn verify_callback(&self, request: &CallbackRequest) -> Result<(), PaymentError>;

    /// Process a callback and produce the provider-specific reply.
    /// Protocol errors are part of the reply, never an `Err`.
    async fn handle_method(&self, request: CallbackRequest) -> CallbackReply;
}
