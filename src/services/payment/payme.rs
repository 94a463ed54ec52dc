// Payme merchant API: checkout links and the JSON-RPC endpoint Payme calls.
//
// Transaction states: 0 not created, 1 created, 2 performed,
// -1 cancelled before perform, -2 cancelled after perform.
// The Payme transaction id lives in payments.transaction_id; the `transaction`
// value returned to Payme is our payment id.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use diesel_async::{AsyncConnection, AsyncPgConnection};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::fulfillment;
use super::provider::{append_webhook, CallbackReply, CallbackRequest, Checkout, PaymentProvider};
use super::PaymentError;
use crate::app_config::PaymeConfig;
use crate::db::{DieselPool, RedisPool};
use crate::models::{Payment, PaymentMethod, PaymentProviderUpdate, PaymentStatus};

pub mod codes {
    pub const INVALID_AUTHORIZATION: i32 = -32504;
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    pub const TRANSACTION_NOT_FOUND: i32 = -31003;
    pub const CANNOT_PERFORM: i32 = -31007;
    pub const CANNOT_CANCEL: i32 = -31008;
    pub const ORDER_NOT_FOUND: i32 = -31050;
    pub const INCORRECT_AMOUNT: i32 = -31051;
    pub const ORDER_BUSY: i32 = -31099;
}

pub mod state {
    pub const CREATED: i16 = 1;
    pub const PERFORMED: i16 = 2;
    pub const CANCELLED: i16 = -1;
    pub const CANCELLED_AFTER_PERFORM: i16 = -2;
}

/// Cancellation reason Payme defines for a transaction that timed out
pub const REASON_TIMEOUT: i32 = 4;

/// How long a request waits for another handler of the same transaction
const LOCK_WAIT: Duration = Duration::from_secs(3);
const LOCK_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalizedMessage {
    pub ru: &'static str,
    pub uz: &'static str,
    pub en: &'static str,
}

/// Protocol error delivered in-band in the JSON-RPC reply
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Payme error {code}: {}", message.en)]
pub struct PaymeError {
    pub code: i32,
    pub message: LocalizedMessage,
    pub data: Option<String>,
}

impl PaymeError {
    fn new(code: i32, ru: &'static str, uz: &'static str, en: &'static str) -> Self {
        Self {
            code,
            message: LocalizedMessage { ru, uz, en },
            data: None,
        }
    }

    fn with_data(mut self, field: &str) -> Self {
        self.data = Some(field.to_string());
        self
    }

    pub fn unauthorized() -> Self {
        Self::new(
            codes::INVALID_AUTHORIZATION,
            "Неверная авторизация",
            "Avtorizatsiya noto'g'ri",
            "Invalid authorization",
        )
    }

    pub fn parse_error() -> Self {
        Self::new(
            codes::PARSE_ERROR,
            "Ошибка разбора JSON",
            "JSON tahlil xatosi",
            "Parse error",
        )
    }

    pub fn invalid_request() -> Self {
        Self::new(
            codes::INVALID_REQUEST,
            "Неверный запрос",
            "Noto'g'ri so'rov",
            "Invalid request",
        )
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            codes::METHOD_NOT_FOUND,
            "Метод не найден",
            "Metod topilmadi",
            "Method not found",
        )
        .with_data(method)
    }

    pub fn invalid_params(detail: &str) -> Self {
        Self::new(
            codes::INVALID_PARAMS,
            "Неверные параметры",
            "Noto'g'ri parametrlar",
            "Invalid params",
        )
        .with_data(detail)
    }

    pub fn internal() -> Self {
        Self::new(
            codes::INTERNAL_ERROR,
            "Внутренняя ошибка",
            "Ichki xatolik",
            "Internal error",
        )
    }

    pub fn order_not_found() -> Self {
        Self::new(
            codes::ORDER_NOT_FOUND,
            "Заказ не найден",
            "Buyurtma topilmadi",
            "Order not found",
        )
        .with_data("order_id")
    }

    pub fn incorrect_amount() -> Self {
        Self::new(
            codes::INCORRECT_AMOUNT,
            "Неверная сумма",
            "Noto'g'ri summa",
            "Incorrect amount",
        )
        .with_data("amount")
    }

    pub fn order_busy() -> Self {
        Self::new(
            codes::ORDER_BUSY,
            "Заказ ожидает оплаты или уже оплачен",
            "Buyurtma band yoki allaqachon to'langan",
            "Order is busy or already paid",
        )
        .with_data("order_id")
    }

    pub fn transaction_not_found() -> Self {
        Self::new(
            codes::TRANSACTION_NOT_FOUND,
            "Транзакция не найдена",
            "Tranzaksiya topilmadi",
            "Transaction not found",
        )
        .with_data("id")
    }

    pub fn cannot_perform() -> Self {
        Self::new(
            codes::CANNOT_PERFORM,
            "Невозможно выполнить операцию",
            "Amalni bajarib bo'lmaydi",
            "Unable to perform operation",
        )
    }

    pub fn cannot_cancel() -> Self {
        Self::new(
            codes::CANNOT_CANCEL,
            "Невозможно отменить транзакцию",
            "Tranzaksiyani bekor qilib bo'lmaydi",
            "Unable to cancel transaction",
        )
    }

    pub fn to_json(&self) -> JsonValue {
        json!({
            "code": self.code,
            "message": self.message,
            "data": self.data,
        })
    }
}

pub fn rpc_success(id: JsonValue, result: JsonValue) -> JsonValue {
    json!({ "id": id, "result": result, "error": null })
}

pub fn rpc_error(id: JsonValue, error: &PaymeError) -> JsonValue {
    json!({ "id": id, "result": null, "error": error.to_json() })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymeMethod {
    CheckPerformTransaction,
    CreateTransaction,
    PerformTransaction,
    CancelTransaction,
    CheckTransaction,
    GetStatement,
}

impl PaymeMethod {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "CheckPerformTransaction" => Some(Self::CheckPerformTransaction),
            "CreateTransaction" => Some(Self::CreateTransaction),
            "PerformTransaction" => Some(Self::PerformTransaction),
            "CancelTransaction" => Some(Self::CancelTransaction),
            "CheckTransaction" => Some(Self::CheckTransaction),
            "GetStatement" => Some(Self::GetStatement),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Account {
    order_id: Option<JsonValue>,
}

impl Account {
    /// Order ids are payment UUIDs; any other shape, numbers included, is not an order
    fn order_id(&self) -> Option<Uuid> {
        match self.order_id.as_ref()? {
            JsonValue::String(s) => Uuid::parse_str(s.trim()).ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct CheckPerformParams {
    amount: i64,
    account: Account,
}

#[derive(Debug, Clone, Deserialize)]
struct CreateParams {
    id: String,
    time: i64,
    amount: i64,
    account: Account,
}

#[derive(Debug, Clone, Deserialize)]
struct TransactionParams {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CancelParams {
    id: String,
    reason: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
struct StatementParams {
    from: i64,
    to: i64,
}

fn parse_params<T: serde::de::DeserializeOwned>(params: JsonValue) -> Result<T, PaymeError> {
    serde_json::from_value(params).map_err(|e| PaymeError::invalid_params(&e.to_string()))
}

/// A created transaction is dead once it outlived the provider timeout
pub fn is_timed_out(create_time_ms: i64, now_ms: i64, timeout_ms: i64) -> bool {
    now_ms - create_time_ms > timeout_ms
}

/// CheckTransaction / GetStatement view of a payment
pub fn transaction_details(payment: &Payment) -> JsonValue {
    let state = payment.provider_state.unwrap_or(0);
    json!({
        "create_time": payment.provider_create_time.unwrap_or(0),
        "perform_time": payment.provider_perform_time.unwrap_or(0),
        "cancel_time": payment.provider_cancel_time.unwrap_or(0),
        "transaction": payment.id.to_string(),
        "state": state,
        "reason": if state < 0 { payment.cancel_reason } else { None },
    })
}

/// Checkout URL: base64 of `m=..;ac.order_id=..;a=..[;c=..]` appended to the API URL
pub fn checkout_url(config: &PaymeConfig, return_url: &str, payment: &Payment) -> String {
    let mut params = format!(
        "m={};ac.order_id={};a={}",
        config.merchant_id, payment.id, payment.amount
    );
    if !return_url.is_empty() {
        params.push_str(&format!(";c={}", return_url));
    }
    format!(
        "{}/{}",
        config.api_url.trim_end_matches('/'),
        STANDARD.encode(params)
    )
}

/// Outcome of a method run inside a database transaction: the outer error rolls back,
/// the inner protocol error commits whatever the method already wrote.
type MethodResult = Result<Result<JsonValue, PaymeError>, PaymentError>;

#[derive(Clone)]
pub struct PaymeProvider {
    diesel_pool: DieselPool,
    redis_pool: RedisPool,
    config: PaymeConfig,
    return_url: String,
}

impl PaymeProvider {
    pub fn new(
        diesel_pool: DieselPool,
        redis_pool: RedisPool,
        config: PaymeConfig,
        return_url: String,
    ) -> Self {
        Self {
            diesel_pool,
            redis_pool,
            config,
            return_url,
        }
    }

    fn expected_authorization(&self) -> String {
        format!(
            "Basic {}",
            STANDARD.encode(format!("{}:{}", self.config.login, self.config.secret_key))
        )
    }

    /// Constant-time check of the Basic credential Payme sends
    pub fn is_authorized(&self, header: Option<&str>) -> bool {
        if self.config.secret_key.is_empty() {
            return false;
        }
        let Some(header) = header else {
            return false;
        };
        let expected = self.expected_authorization();
        header.trim().as_bytes().ct_eq(expected.as_bytes()).into()
    }

    /// Parse, authenticate and run one JSON-RPC request
    #[instrument(skip(self, request))]
    pub async fn dispatch(&self, request: &CallbackRequest) -> JsonValue {
        let parsed: Result<JsonValue, _> = serde_json::from_slice(&request.body);
        let id = parsed
            .as_ref()
            .ok()
            .and_then(|v| v.get("id").cloned())
            .unwrap_or(JsonValue::Null);

        if !self.is_authorized(request.authorization()) {
            warn!("Payme request with invalid authorization");
            return rpc_error(id, &PaymeError::unauthorized());
        }

        let envelope = match parsed {
            Ok(v) if v.is_object() => v,
            Ok(_) => return rpc_error(id, &PaymeError::invalid_request()),
            Err(_) => return rpc_error(JsonValue::Null, &PaymeError::parse_error()),
        };

        let Some(method_name) = envelope.get("method").and_then(|m| m.as_str()) else {
            return rpc_error(id, &PaymeError::invalid_request());
        };
        let params = envelope.get("params").cloned().unwrap_or_else(|| json!({}));
        if !params.is_object() {
            return rpc_error(id, &PaymeError::invalid_request());
        }

        let Some(method) = PaymeMethod::parse(method_name) else {
            return rpc_error(id, &PaymeError::method_not_found(method_name));
        };

        let entry = json!({
            "method": method_name,
            "params": params,
            "received_at": Utc::now().timestamp_millis(),
        });

        match self.call(method, params, entry).await {
            Ok(result) => rpc_success(id, result),
            Err(e) => {
                info!(code = e.code, method = method_name, "Payme method refused");
                rpc_error(id, &e)
            },
        }
    }

    async fn call(
        &self,
        method: PaymeMethod,
        params: JsonValue,
        entry: JsonValue,
    ) -> Result<JsonValue, PaymeError> {
        match method {
            PaymeMethod::CheckPerformTransaction => {
                self.check_perform_transaction(parse_params(params)?).await
            },
            PaymeMethod::CreateTransaction => {
                let params: CreateParams = parse_params(params)?;
                let id = params.id.clone();
                self.with_lock(&id, self.create_transaction(params, entry)).await
            },
            PaymeMethod::PerformTransaction => {
                let params: TransactionParams = parse_params(params)?;
                let id = params.id.clone();
                self.with_lock(&id, self.perform_transaction(params, entry)).await
            },
            PaymeMethod::CancelTransaction => {
                let params: CancelParams = parse_params(params)?;
                let id = params.id.clone();
                self.with_lock(&id, self.cancel_transaction(params, entry)).await
            },
            PaymeMethod::CheckTransaction => self.check_transaction(parse_params(params)?).await,
            PaymeMethod::GetStatement => self.get_statement(parse_params(params)?).await,
        }
    }

    /// Run `work` while holding the single-flight lock for a Payme transaction id
    async fn with_lock<F>(&self, transaction_id: &str, work: F) -> Result<JsonValue, PaymeError>
    where
        F: std::future::Future<Output = Result<JsonValue, PaymeError>>,
    {
        let key = format!("payme:lock:{}", transaction_id);
        let owner = Uuid::new_v4().to_string();
        let started = Instant::now();

        loop {
            match self
                .redis_pool
                .set_nx_px(&key, &owner, self.config.lock_ttl_ms)
                .await
            {
                Ok(true) => break,
                Ok(false) if started.elapsed() < LOCK_WAIT => tokio::time::sleep(LOCK_POLL).await,
                Ok(false) => {
                    warn!(transaction_id, "Timed out waiting for Payme transaction lock");
                    return Err(PaymeError::internal());
                },
                Err(e) => {
                    error!("Failed to take Payme lock: {}", e);
                    return Err(PaymeError::internal());
                },
            }
        }

        let result = work.await;

        if let Err(e) = self.redis_pool.release_lock(&key, &owner).await {
            warn!("Failed to release Payme lock {}: {}", key, e);
        }
        result
    }

    async fn connection(
        &self,
    ) -> Result<
        bb8::PooledConnection<
            '_,
            diesel_async::pooled_connection::AsyncDieselConnectionManager<AsyncPgConnection>,
        >,
        PaymeError,
    > {
        self.diesel_pool.get().await.map_err(|e| {
            error!("Payme handler could not get a connection: {}", e);
            PaymeError::internal()
        })
    }

    fn flatten(outcome: MethodResult) -> Result<JsonValue, PaymeError> {
        match outcome {
            Ok(reply) => reply,
            Err(e) => {
                error!("Payme method failed: {}", e);
                Err(PaymeError::internal())
            },
        }
    }

    async fn check_perform_transaction(
        &self,
        params: CheckPerformParams,
    ) -> Result<JsonValue, PaymeError> {
        let mut conn = self.connection().await?;

        let order_id = params
            .account
            .order_id()
            .ok_or_else(PaymeError::order_not_found)?;

        let payment = Payment::find_by_id(&mut conn, order_id)
            .await
            .map_err(|e| {
                error!("CheckPerformTransaction lookup failed: {}", e);
                PaymeError::internal()
            })?;

        validate_order(payment.as_ref(), params.amount)?;
        Ok(json!({ "allow": true }))
    }

    async fn create_transaction(
        &self,
        params: CreateParams,
        entry: JsonValue,
    ) -> Result<JsonValue, PaymeError> {
        let mut conn = self.connection().await?;
        let timeout_ms = self.config.transaction_timeout_ms;

        let outcome: MethodResult = conn
            .transaction::<_, PaymentError, _>(|tx| {
                Box::pin(async move {
                    let now_ms = Utc::now().timestamp_millis();

                    if let Some(existing) =
                        Payment::lock_by_transaction_id(tx, PaymentMethod::Payme, &params.id)
                            .await?
                    {
                        if existing.provider_state != Some(state::CREATED) {
                            return Ok(Err(PaymeError::cannot_perform()));
                        }
                        let create_time = existing.provider_create_time.unwrap_or(now_ms);
                        if is_timed_out(create_time, now_ms, timeout_ms) {
                            cancel_timed_out(tx, &existing, entry, now_ms).await?;
                            return Ok(Err(PaymeError::cannot_perform()));
                        }
                        if params.account.order_id() != Some(existing.id) {
                            return Ok(Err(PaymeError::order_not_found()));
                        }
                        if params.amount != existing.amount {
                            return Ok(Err(PaymeError::incorrect_amount()));
                        }

                        return Ok(Ok(json!({
                            "create_time": create_time,
                            "transaction": existing.id.to_string(),
                            "state": state::CREATED,
                        })));
                    }

                    let Some(order_id) = params.account.order_id() else {
                        return Ok(Err(PaymeError::order_not_found()));
                    };
                    let payment = Payment::lock_by_id(tx, order_id).await?;
                    let payment = match validate_order(payment.as_ref(), params.amount) {
                        Ok(p) => p.clone(),
                        Err(e) => return Ok(Err(e)),
                    };

                    if is_timed_out(params.time, now_ms, timeout_ms) {
                        return Ok(Err(PaymeError::cannot_perform()));
                    }

                    let update = PaymentProviderUpdate {
                        transaction_id: Some(params.id.clone()),
                        provider_state: Some(state::CREATED),
                        provider_create_time: Some(params.time),
                        webhook_data: Some(append_webhook(payment.webhook_data.as_ref(), entry)),
                        ..Default::default()
                    };
                    let payment = Payment::apply_update(tx, payment.id, update).await?;

                    info!(payment_id = %payment.id, "Payme transaction created");
                    Ok(Ok(json!({
                        "create_time": params.time,
                        "transaction": payment.id.to_string(),
                        "state": state::CREATED,
                    })))
                })
            })
            .await;

        Self::flatten(outcome)
    }

    async fn perform_transaction(
        &self,
        params: TransactionParams,
        entry: JsonValue,
    ) -> Result<JsonValue, PaymeError> {
        let mut conn = self.connection().await?;
        let timeout_ms = self.config.transaction_timeout_ms;

        let outcome: MethodResult = conn
            .transaction::<_, PaymentError, _>(|tx| {
                Box::pin(async move {
                    let now = Utc::now();
                    let now_ms = now.timestamp_millis();

                    let Some(payment) =
                        Payment::lock_by_transaction_id(tx, PaymentMethod::Payme, &params.id)
                            .await?
                    else {
                        return Ok(Err(PaymeError::transaction_not_found()));
                    };

                    if payment.provider_state != Some(state::CREATED) || !payment.is_pending() {
                        return Ok(Err(PaymeError::cannot_perform()));
                    }

                    let create_time = payment.provider_create_time.unwrap_or(now_ms);
                    if is_timed_out(create_time, now_ms, timeout_ms) {
                        cancel_timed_out(tx, &payment, entry, now_ms).await?;
                        return Ok(Err(PaymeError::cannot_perform()));
                    }

                    let update = PaymentProviderUpdate {
                        provider_state: Some(state::PERFORMED),
                        provider_perform_time: Some(now_ms),
                        webhook_data: Some(append_webhook(payment.webhook_data.as_ref(), entry)),
                        ..Default::default()
                    };
                    let completed = fulfillment::complete_payment(tx, &payment, update, now).await?;

                    Ok(Ok(json!({
                        "perform_time": now_ms,
                        "transaction": completed.id.to_string(),
                        "state": state::PERFORMED,
                    })))
                })
            })
            .await;

        Self::flatten(outcome)
    }

    async fn cancel_transaction(
        &self,
        params: CancelParams,
        entry: JsonValue,
    ) -> Result<JsonValue, PaymeError> {
        let mut conn = self.connection().await?;

        let outcome: MethodResult = conn
            .transaction::<_, PaymentError, _>(|tx| {
                Box::pin(async move {
                    let now = Utc::now();
                    let now_ms = now.timestamp_millis();

                    let Some(payment) =
                        Payment::lock_by_transaction_id(tx, PaymentMethod::Payme, &params.id)
                            .await?
                    else {
                        return Ok(Err(PaymeError::transaction_not_found()));
                    };

                    let new_state = match payment.provider_state {
                        Some(state::CREATED) => state::CANCELLED,
                        Some(state::PERFORMED) => {
                            fulfillment::reverse_payment(tx, &payment, now).await?;
                            state::CANCELLED_AFTER_PERFORM
                        },
                        Some(s @ (state::CANCELLED | state::CANCELLED_AFTER_PERFORM)) => {
                            return Ok(Ok(json!({
                                "cancel_time": payment.provider_cancel_time.unwrap_or(0),
                                "transaction": payment.id.to_string(),
                                "state": s,
                            })));
                        },
                        _ => return Ok(Err(PaymeError::cannot_cancel())),
                    };

                    let update = PaymentProviderUpdate {
                        status: Some(PaymentStatus::Cancelled.as_str().to_string()),
                        provider_state: Some(new_state),
                        provider_cancel_time: Some(now_ms),
                        cancel_reason: params.reason,
                        completed_at: Some(None),
                        webhook_data: Some(append_webhook(payment.webhook_data.as_ref(), entry)),
                        ..Default::default()
                    };
                    let payment = Payment::apply_update(tx, payment.id, update).await?;

                    info!(payment_id = %payment.id, state = new_state, "Payme transaction cancelled");
                    Ok(Ok(json!({
                        "cancel_time": now_ms,
                        "transaction": payment.id.to_string(),
                        "state": new_state,
                    })))
                })
            })
            .await;

        Self::flatten(outcome)
    }

    async fn check_transaction(&self, params: TransactionParams) -> Result<JsonValue, PaymeError> {
        let mut conn = self.connection().await?;

        let outcome: MethodResult = conn
            .transaction::<_, PaymentError, _>(|tx| {
                Box::pin(async move {
                    Ok(
                        match Payment::lock_by_transaction_id(tx, PaymentMethod::Payme, &params.id)
                            .await?
                        {
                            Some(payment) => Ok(transaction_details(&payment)),
                            None => Err(PaymeError::transaction_not_found()),
                        },
                    )
                })
            })
            .await;

        Self::flatten(outcome)
    }

    async fn get_statement(&self, params: StatementParams) -> Result<JsonValue, PaymeError> {
        if params.from > params.to {
            return Err(PaymeError::invalid_params("from"));
        }
        let mut conn = self.connection().await?;

        let payments = Payment::list_payme_in_window(&mut conn, params.from, params.to)
            .await
            .map_err(|e| {
                error!("GetStatement query failed: {}", e);
                PaymeError::internal()
            })?;

        let transactions: Vec<JsonValue> = payments
            .iter()
            .map(|p| {
                let mut details = transaction_details(p);
                details["id"] = json!(p.transaction_id);
                details["time"] = json!(p.provider_create_time);
                details["amount"] = json!(p.amount);
                details["account"] = json!({ "order_id": p.id.to_string() });
                details
            })
            .collect();

        Ok(json!({ "transactions": transactions }))
    }
}

/// Shared order checks for CheckPerformTransaction and CreateTransaction
fn validate_order(payment: Option<&Payment>, amount: i64) -> Result<&Payment, PaymeError> {
    let payment = payment
        .filter(|p| p.method() == Some(PaymentMethod::Payme))
        .ok_or_else(PaymeError::order_not_found)?;

    if payment.amount != amount {
        return Err(PaymeError::incorrect_amount());
    }
    if !payment.is_pending() || payment.transaction_id.is_some() {
        return Err(PaymeError::order_busy());
    }
    Ok(payment)
}

/// Cancel a created transaction that outlived the provider timeout
async fn cancel_timed_out(
    tx: &mut AsyncPgConnection,
    payment: &Payment,
    entry: JsonValue,
    now_ms: i64,
) -> Result<(), PaymentError> {
    let update = PaymentProviderUpdate {
        status: Some(PaymentStatus::Cancelled.as_str().to_string()),
        provider_state: Some(state::CANCELLED),
        provider_cancel_time: Some(now_ms),
        cancel_reason: Some(REASON_TIMEOUT),
        webhook_data: Some(append_webhook(payment.webhook_data.as_ref(), entry)),
        ..Default::default()
    };
    Payment::apply_update(tx, payment.id, update).await?;
    warn!(payment_id = %payment.id, "Payme transaction timed out and was cancelled");
    Ok(())
}

#[async_trait]
impl PaymentProvider for PaymeProvider {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Payme
    }

    async fn build_checkout(&self, payment: &Payment) -> Result<Checkout, PaymentError> {
        if self.config.merchant_id.is_empty() {
            return Err(PaymentError::UnsupportedMethod("payme".to_string()));
        }
        Ok(Checkout {
            payment_url: checkout_url(&self.config, &self.return_url, payment),
        })
    }

    fn verify_callback(&self, request: &CallbackRequest) -> Result<(), PaymentError> {
        if self.is_authorized(request.authorization()) {
            Ok(())
        } else {
            Err(PaymentError::InvalidSignature)
        }
    }

    async fn handle_method(&self, request: CallbackRequest) -> CallbackReply {
        CallbackReply::ok(self.dispatch(&request).await)
    }
}
