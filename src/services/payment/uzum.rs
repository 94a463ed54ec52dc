// Uzumbank checkout redirect and signed status callback.
// Unlike Payme and Click, refusals are plain HTTP 4xx replies.

use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::Utc;
use diesel_async::{AsyncConnection, AsyncPgConnection};
use serde_json::{json, Map, Value as JsonValue};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::fulfillment;
use super::provider::{append_webhook, CallbackReply, CallbackRequest, Checkout, PaymentProvider};
use super::PaymentError;
use crate::app_config::UzumConfig;
use crate::db::DieselPool;
use crate::models::{Payment, PaymentMethod, PaymentProviderUpdate, PaymentStatus};

/// What a callback status means for the payment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UzumOutcome {
    Completed,
    Failed,
    Pending,
}

impl UzumOutcome {
    pub fn from_status(status: &str) -> Self {
        match status.to_lowercase().as_str() {
            "success" => UzumOutcome::Completed,
            "failed" | "error" | "cancelled" => UzumOutcome::Failed,
            _ => UzumOutcome::Pending,
        }
    }
}

fn scalar_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// SHA-256 hex of `k=v&...` sorted by key, followed by the secret.
/// The `signature` field itself never takes part.
pub fn uzum_signature(params: &Map<String, JsonValue>, secret_key: &str) -> String {
    let mut keys: Vec<&String> = params.keys().filter(|k| k.as_str() != "signature").collect();
    keys.sort();

    let joined = keys
        .iter()
        .map(|k| format!("{}={}", k, scalar_to_string(&params[k.as_str()])))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret_key.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn refusal(status: StatusCode, message: &str) -> CallbackReply {
    CallbackReply::with_status(status, json!({ "success": false, "error": message }))
}

pub struct UzumProvider {
    diesel_pool: DieselPool,
    config: UzumConfig,
}

impl UzumProvider {
    pub fn new(diesel_pool: DieselPool, config: UzumConfig) -> Self {
        Self {
            diesel_pool,
            config,
        }
    }

    pub fn checkout_url(&self, payment: &Payment) -> String {
        format!(
            "{}?merchant_id={}&amount={}&order_id={}",
            self.config.base_url, self.config.merchant_id, payment.amount, payment.id
        )
    }

    fn signature_matches(&self, params: &Map<String, JsonValue>) -> bool {
        if self.config.secret_key.is_empty() {
            return false;
        }
        let Some(given) = params.get("signature").and_then(|v| v.as_str()) else {
            return false;
        };
        let expected = uzum_signature(params, &self.config.secret_key);
        expected
            .as_bytes()
            .ct_eq(given.to_lowercase().as_bytes())
            .into()
    }

    async fn process(&self, params: Map<String, JsonValue>) -> CallbackReply {
        let Some(payment_id) = params
            .get("order_id")
            .and_then(|v| v.as_str())
            .and_then(|v| Uuid::parse_str(v).ok())
        else {
            return refusal(StatusCode::BAD_REQUEST, "order_id is required");
        };
        let outcome = UzumOutcome::from_status(
            params.get("status").and_then(|v| v.as_str()).unwrap_or_default(),
        );

        let mut conn = match self.diesel_pool.get().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Uzum callback could not get a connection: {}", e);
                return refusal(StatusCode::SERVICE_UNAVAILABLE, "Service unavailable");
            },
        };

        let result = conn
            .transaction::<_, PaymentError, _>(|tx| {
                Box::pin(async move { apply_callback(tx, payment_id, outcome, params).await })
            })
            .await;

        match result {
            Ok(reply) => reply,
            Err(e) => {
                error!(%payment_id, "Uzum callback failed: {}", e);
                refusal(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
            },
        }
    }
}

async fn apply_callback(
    tx: &mut AsyncPgConnection,
    payment_id: Uuid,
    outcome: UzumOutcome,
    params: Map<String, JsonValue>,
) -> Result<CallbackReply, PaymentError> {
    let Some(payment) = Payment::lock_by_id(tx, payment_id).await? else {
        return Ok(refusal(StatusCode::NOT_FOUND, "Order not found"));
    };
    if payment.method() != Some(PaymentMethod::Uzum) {
        return Ok(refusal(StatusCode::NOT_FOUND, "Order not found"));
    }
    if let Some(amount) = params.get("amount") {
        if scalar_to_string(amount).parse::<i64>().ok() != Some(payment.amount) {
            return Ok(refusal(StatusCode::BAD_REQUEST, "Incorrect amount"));
        }
    }

    if !payment.is_pending() {
        // Repeated notification for a settled payment
        return Ok(CallbackReply::ok(json!({
            "success": true,
            "status": payment.status,
        })));
    }

    let update = PaymentProviderUpdate {
        transaction_id: params
            .get("transaction_id")
            .map(scalar_to_string)
            .filter(|v| !v.is_empty()),
        webhook_data: Some(append_webhook(
            payment.webhook_data.as_ref(),
            JsonValue::Object(params),
        )),
        ..Default::default()
    };

    let status = match outcome {
        UzumOutcome::Completed => {
            fulfillment::complete_payment(tx, &payment, update, Utc::now())
                .await?
                .status
        },
        UzumOutcome::Failed => {
            let update = PaymentProviderUpdate {
                status: Some(PaymentStatus::Failed.as_str().to_string()),
                ..update
            };
            let failed = Payment::apply_update(tx, payment.id, update).await?;
            warn!(payment_id = %failed.id, "Uzum reported a failed payment");
            failed.status
        },
        UzumOutcome::Pending => {
            let pending = Payment::apply_update(tx, payment.id, update).await?;
            info!(payment_id = %pending.id, "Uzum callback left payment pending");
            pending.status
        },
    };

    Ok(CallbackReply::ok(json!({ "success": true, "status": status })))
}

#[async_trait]
impl PaymentProvider for UzumProvider {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Uzum
    }

    async fn build_checkout(&self, payment: &Payment) -> Result<Checkout, PaymentError> {
        if self.config.merchant_id.is_empty() {
            return Err(PaymentError::UnsupportedMethod("uzum".to_string()));
        }
        Ok(Checkout {
            payment_url: self.checkout_url(payment),
        })
    }

    fn verify_callback(&self, request: &CallbackRequest) -> Result<(), PaymentError> {
        match request.json()? {
            JsonValue::Object(params) if self.signature_matches(&params) => Ok(()),
            _ => Err(PaymentError::InvalidSignature),
        }
    }

    async fn handle_method(&self, request: CallbackRequest) -> CallbackReply {
        let params = match request.json() {
            Ok(JsonValue::Object(params)) => params,
            _ => return refusal(StatusCode::BAD_REQUEST, "Invalid callback body"),
        };
        if !self.signature_matches(&params) {
            warn!("Uzum callback with invalid signature");
            return refusal(StatusCode::UNAUTHORIZED, "Invalid signature");
        }
        self.process(params).await
    }
}
