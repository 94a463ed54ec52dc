// Click Shop API: prepare (action 0) and complete (action 1) callbacks.
// Errors are answered in-band with HTTP 200.

use async_trait::async_trait;
use chrono::Utc;
use diesel_async::{AsyncConnection, AsyncPgConnection};
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use subtle::ConstantTimeEq;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::fulfillment;
use super::provider::{append_webhook, CallbackReply, CallbackRequest, Checkout, PaymentProvider};
use super::PaymentError;
use crate::app_config::ClickConfig;
use crate::db::DieselPool;
use crate::models::{Payment, PaymentMethod, PaymentProviderUpdate, PaymentStatus};

pub const ACTION_PREPARE: i32 = 0;
pub const ACTION_COMPLETE: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickError {
    Success,
    SignFailed,
    IncorrectAmount,
    ActionNotFound,
    AlreadyPaid,
    OrderNotFound,
    TransactionNotFound,
    UpdateFailed,
    BadRequest,
    Cancelled,
}

impl ClickError {
    pub fn code(&self) -> i32 {
        match self {
            ClickError::Success => 0,
            ClickError::SignFailed => -1,
            ClickError::IncorrectAmount => -2,
            ClickError::ActionNotFound => -3,
            ClickError::AlreadyPaid => -4,
            ClickError::OrderNotFound => -5,
            ClickError::TransactionNotFound => -6,
            ClickError::UpdateFailed => -7,
            ClickError::BadRequest => -8,
            ClickError::Cancelled => -9,
        }
    }

    pub fn note(&self) -> &'static str {
        match self {
            ClickError::Success => "Success",
            ClickError::SignFailed => "SIGN CHECK FAILED!",
            ClickError::IncorrectAmount => "Incorrect parameter amount",
            ClickError::ActionNotFound => "Action not found",
            ClickError::AlreadyPaid => "Already paid",
            ClickError::OrderNotFound => "User does not exist",
            ClickError::TransactionNotFound => "Transaction does not exist",
            ClickError::UpdateFailed => "Failed to update user",
            ClickError::BadRequest => "Error in request from click",
            ClickError::Cancelled => "Transaction cancelled",
        }
    }
}

/// Form fields Click posts to the prepare/complete URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickParams {
    pub click_trans_id: String,
    pub service_id: String,
    pub merchant_trans_id: String,
    pub merchant_prepare_id: Option<String>,
    pub amount: String,
    pub action: i32,
    pub error: i32,
    pub sign_time: String,
    pub sign_string: String,
}

impl ClickParams {
    pub fn from_form(form: &BTreeMap<String, String>) -> Result<Self, ClickError> {
        let field = |name: &str| {
            form.get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ClickError::BadRequest)
        };

        Ok(Self {
            click_trans_id: field("click_trans_id")?,
            service_id: field("service_id")?,
            merchant_trans_id: field("merchant_trans_id")?,
            merchant_prepare_id: field("merchant_prepare_id").ok(),
            amount: field("amount")?,
            action: field("action")?
                .parse()
                .map_err(|_| ClickError::BadRequest)?,
            error: field("error")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            sign_time: field("sign_time")?,
            sign_string: field("sign_string")?,
        })
    }

    fn to_json(&self) -> JsonValue {
        json!({
            "click_trans_id": self.click_trans_id,
            "service_id": self.service_id,
            "merchant_trans_id": self.merchant_trans_id,
            "merchant_prepare_id": self.merchant_prepare_id,
            "amount": self.amount,
            "action": self.action,
            "error": self.error,
            "sign_time": self.sign_time,
        })
    }
}

/// MD5 over the concatenated fields; the prepare id only takes part on complete
pub fn click_signature(params: &ClickParams, secret_key: &str) -> String {
    let mut source = String::new();
    source.push_str(&params.click_trans_id);
    source.push_str(&params.service_id);
    source.push_str(secret_key);
    source.push_str(&params.merchant_trans_id);
    if params.action == ACTION_COMPLETE {
        if let Some(prepare_id) = &params.merchant_prepare_id {
            source.push_str(prepare_id);
        }
    }
    source.push_str(&params.amount);
    source.push_str(&params.action.to_string());
    source.push_str(&params.sign_time);
    format!("{:x}", md5::compute(source.as_bytes()))
}

/// "150000.00" so'm to tiyin
pub fn som_to_tiyin(amount: &str) -> Option<i64> {
    let (whole, fraction) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };
    if whole.is_empty() || fraction.len() > 2 {
        return None;
    }
    let whole: i64 = whole.parse().ok()?;
    let fraction: i64 = if fraction.is_empty() {
        0
    } else {
        format!("{:0<2}", fraction).parse().ok()?
    };
    whole.checked_mul(100)?.checked_add(fraction)
}

/// Build the in-band response for either action
pub fn click_reply(
    params: Option<&ClickParams>,
    payment_id: Option<Uuid>,
    outcome: ClickError,
) -> JsonValue {
    let mut body = json!({
        "click_trans_id": params.map(|p| p.click_trans_id.clone()),
        "merchant_trans_id": params.map(|p| p.merchant_trans_id.clone()),
        "error": outcome.code(),
        "error_note": outcome.note(),
    });
    let id_field = match params.map(|p| p.action) {
        Some(ACTION_COMPLETE) => "merchant_confirm_id",
        _ => "merchant_prepare_id",
    };
    body[id_field] = json!(payment_id.map(|id| id.to_string()));
    body
}

pub struct ClickProvider {
    diesel_pool: DieselPool,
    config: ClickConfig,
    return_url: String,
}

impl ClickProvider {
    pub fn new(diesel_pool: DieselPool, config: ClickConfig, return_url: String) -> Self {
        Self {
            diesel_pool,
            config,
            return_url,
        }
    }

    pub fn checkout_url(&self, payment: &Payment) -> String {
        let mut url = format!(
            "{}?service_id={}&merchant_id={}&amount={}&transaction_param={}",
            self.config.base_url,
            self.config.service_id,
            self.config.merchant_id,
            payment.amount / 100,
            payment.id
        );
        if !self.return_url.is_empty() {
            let encoded: String =
                url::form_urlencoded::byte_serialize(self.return_url.as_bytes()).collect();
            url.push_str(&format!("&return_url={}", encoded));
        }
        url
    }

    fn signature_matches(&self, params: &ClickParams) -> bool {
        if self.config.secret_key.is_empty() {
            return false;
        }
        let expected = click_signature(params, &self.config.secret_key);
        expected
            .as_bytes()
            .ct_eq(params.sign_string.to_lowercase().as_bytes())
            .into()
    }

    async fn process(&self, params: ClickParams) -> (Option<Uuid>, ClickError) {
        let Ok(payment_id) = Uuid::parse_str(&params.merchant_trans_id) else {
            return (None, ClickError::OrderNotFound);
        };

        let mut conn = match self.diesel_pool.get().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Click callback could not get a connection: {}", e);
                return (None, ClickError::UpdateFailed);
            },
        };

        let outcome = conn
            .transaction::<_, PaymentError, _>(|tx| {
                Box::pin(async move { apply_callback(tx, payment_id, params).await })
            })
            .await;

        match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(%payment_id, "Click callback failed: {}", e);
                (Some(payment_id), ClickError::UpdateFailed)
            },
        }
    }
}

async fn apply_callback(
    tx: &mut AsyncPgConnection,
    payment_id: Uuid,
    params: ClickParams,
) -> Result<(Option<Uuid>, ClickError), PaymentError> {
    let Some(payment) = Payment::lock_by_id(tx, payment_id).await? else {
        return Ok((None, ClickError::OrderNotFound));
    };
    if payment.method() != Some(PaymentMethod::Click) {
        return Ok((None, ClickError::OrderNotFound));
    }
    if som_to_tiyin(&params.amount) != Some(payment.amount) {
        return Ok((Some(payment.id), ClickError::IncorrectAmount));
    }

    match payment.status() {
        Some(PaymentStatus::Completed) => return Ok((Some(payment.id), ClickError::AlreadyPaid)),
        Some(PaymentStatus::Pending) => {},
        _ => return Ok((Some(payment.id), ClickError::Cancelled)),
    }

    let webhook = append_webhook(payment.webhook_data.as_ref(), params.to_json());

    if params.action == ACTION_PREPARE {
        let update = PaymentProviderUpdate {
            transaction_id: Some(params.click_trans_id.clone()),
            webhook_data: Some(webhook),
            ..Default::default()
        };
        Payment::apply_update(tx, payment.id, update).await?;
        info!(payment_id = %payment.id, "Click prepare accepted");
        return Ok((Some(payment.id), ClickError::Success));
    }

    let prepared = params.merchant_prepare_id.as_deref() == Some(payment.id.to_string().as_str())
        && payment.transaction_id.as_deref() == Some(params.click_trans_id.as_str());
    if !prepared {
        return Ok((Some(payment.id), ClickError::TransactionNotFound));
    }

    // Click reports a failed charge through a negative error on complete
    if params.error < 0 {
        let update = PaymentProviderUpdate {
            status: Some(PaymentStatus::Cancelled.as_str().to_string()),
            webhook_data: Some(webhook),
            ..Default::default()
        };
        Payment::apply_update(tx, payment.id, update).await?;
        warn!(payment_id = %payment.id, error = params.error, "Click reported a failed charge");
        return Ok((Some(payment.id), ClickError::Cancelled));
    }

    let update = PaymentProviderUpdate {
        webhook_data: Some(webhook),
        ..Default::default()
    };
    fulfillment::complete_payment(tx, &payment, update, Utc::now()).await?;
    Ok((Some(payment.id), ClickError::Success))
}

#[async_trait]
impl PaymentProvider for ClickProvider {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Click
    }

    async fn build_checkout(&self, payment: &Payment) -> Result<Checkout, PaymentError> {
        if self.config.service_id.is_empty() || self.config.merchant_id.is_empty() {
            return Err(PaymentError::UnsupportedMethod("click".to_string()));
        }
        Ok(Checkout {
            payment_url: self.checkout_url(payment),
        })
    }

    fn verify_callback(&self, request: &CallbackRequest) -> Result<(), PaymentError> {
        let params = ClickParams::from_form(&request.form())
            .map_err(|_| PaymentError::Validation("malformed Click callback".to_string()))?;
        if self.signature_matches(&params) {
            Ok(())
        } else {
            Err(PaymentError::InvalidSignature)
        }
    }

    async fn handle_method(&self, request: CallbackRequest) -> CallbackReply {
        let params = match ClickParams::from_form(&request.form()) {
            Ok(params) => params,
            Err(outcome) => return CallbackReply::ok(click_reply(None, None, outcome)),
        };

        if !self.signature_matches(&params) {
            warn!(click_trans_id = %params.click_trans_id, "Click signature mismatch");
            return CallbackReply::ok(click_reply(Some(&params), None, ClickError::SignFailed));
        }
        if params.action != ACTION_PREPARE && params.action != ACTION_COMPLETE {
            return CallbackReply::ok(click_reply(Some(&params), None, ClickError::ActionNotFound));
        }

        let (payment_id, outcome) = self.process(params.clone()).await;
        CallbackReply::ok(click_reply(Some(&params), payment_id, outcome))
    }
}
