// Payment intents, pricing and provider dispatch

pub mod click;
pub mod fulfillment;
pub mod payme;
pub mod provider;
pub mod uzum;

use chrono::{DateTime, Utc};
use diesel_async::AsyncConnection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::app_config::PaymentConfig;
use crate::db::DieselPool;
use crate::models::catalogue::Service;
use crate::models::{
    Merchant, NewPayment, Payment, PaymentMethod, PaymentProviderUpdate, PaymentStatus,
    PaymentType, TariffPlan, User,
};

pub use provider::{CallbackReply, CallbackRequest, Checkout, PaymentProvider};

/// Allowed tariff purchase lengths
pub const TARIFF_DURATIONS_MONTHS: [i32; 4] = [1, 3, 6, 12];

pub const MIN_FEATURE_DAYS: i32 = 1;
pub const MAX_FEATURE_DAYS: i32 = 365;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Payment method {0} is not configured")]
    UnsupportedMethod(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid callback signature")]
    InvalidSignature,

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Pool error: {0}")]
    Pool(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<bb8::RunError<diesel_async::pooled_connection::PoolError>> for PaymentError {
    fn from(e: bb8::RunError<diesel_async::pooled_connection::PoolError>) -> Self {
        PaymentError::Pool(e.to_string())
    }
}

// =============================================================================
// PRICING
// =============================================================================

/// Tariff price in tiyin for the given number of months
pub fn tariff_amount(price_per_month: i64, duration_months: i32) -> Result<i64, PaymentError> {
    if !TARIFF_DURATIONS_MONTHS.contains(&duration_months) {
        return Err(PaymentError::Validation(format!(
            "duration_months must be one of {:?}",
            TARIFF_DURATIONS_MONTHS
        )));
    }
    if price_per_month <= 0 {
        return Err(PaymentError::Validation(
            "This tariff plan cannot be purchased".to_string(),
        ));
    }

    price_per_month
        .checked_mul(i64::from(duration_months))
        .ok_or_else(|| PaymentError::Validation("Amount out of range".to_string()))
}

/// Discount in percent granted for longer featured placements
pub fn featured_discount_percent(duration_days: i32) -> i64 {
    match duration_days {
        d if d >= 91 => 30,
        d if d >= 31 => 20,
        d if d >= 8 => 10,
        _ => 0,
    }
}

/// Featured placement price in tiyin, floored to whole so'm after the discount
pub fn featured_amount(duration_days: i32, price_per_day_som: i64) -> Result<i64, PaymentError> {
    if !(MIN_FEATURE_DAYS..=MAX_FEATURE_DAYS).contains(&duration_days) {
        return Err(PaymentError::Validation(format!(
            "duration_days must be between {} and {}",
            MIN_FEATURE_DAYS, MAX_FEATURE_DAYS
        )));
    }

    let base_som = i64::from(duration_days)
        .checked_mul(price_per_day_som)
        .ok_or_else(|| PaymentError::Validation("Amount out of range".to_string()))?;
    let discounted_som = base_som * (100 - featured_discount_percent(duration_days)) / 100;

    discounted_som
        .checked_mul(100)
        .ok_or_else(|| PaymentError::Validation("Amount out of range".to_string()))
}

// =============================================================================
// INTENTS
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct TariffIntent {
    pub tariff_plan_id: Uuid,
    pub duration_months: i32,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureIntent {
    pub service_id: String,
    pub duration_days: i32,
    pub payment_method: PaymentMethod,
}

/// Payment as shown to its owner
#[derive(Debug, Clone, Serialize)]
pub struct PaymentSummary {
    pub payment_id: Uuid,
    /// tiyin
    pub amount: i64,
    /// so'm
    pub amount_uzs: i64,
    pub payment_type: String,
    pub payment_method: String,
    pub status: String,
    pub payment_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Payment> for PaymentSummary {
    fn from(payment: &Payment) -> Self {
        Self {
            payment_id: payment.id,
            amount: payment.amount,
            amount_uzs: payment.amount / 100,
            payment_type: payment.payment_type.clone(),
            payment_method: payment.payment_method.clone(),
            status: payment.status.clone(),
            payment_url: payment.payment_url.clone(),
            created_at: payment.created_at,
            completed_at: payment.completed_at,
        }
    }
}

// =============================================================================
// SERVICE
// =============================================================================

/// Provider adapters keyed by method
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<PaymentMethod, Arc<dyn PaymentProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        self.providers.insert(provider.method(), provider);
        self
    }

    pub fn get(&self, method: PaymentMethod) -> Result<Arc<dyn PaymentProvider>, PaymentError> {
        self.providers
            .get(&method)
            .cloned()
            .ok_or_else(|| PaymentError::UnsupportedMethod(method.as_str().to_string()))
    }
}

#[derive(Clone)]
pub struct PaymentService {
    diesel_pool: DieselPool,
    providers: ProviderRegistry,
    config: PaymentConfig,
}

impl PaymentService {
    pub fn new(diesel_pool: DieselPool, providers: ProviderRegistry, config: PaymentConfig) -> Self {
        Self {
            diesel_pool,
            providers,
            config,
        }
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Accept a tariff purchase: pending payment plus checkout link
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn create_tariff_payment(
        &self,
        user: &User,
        intent: TariffIntent,
    ) -> Result<Payment, PaymentError> {
        if !user.is_merchant() {
            return Err(PaymentError::Forbidden(
                "Only merchants can purchase tariffs".to_string(),
            ));
        }

        let mut conn = self.diesel_pool.get().await?;

        Merchant::find_by_user_id(&mut conn, user.id)
            .await?
            .ok_or_else(|| PaymentError::NotFound("Merchant profile".to_string()))?;

        let plan = TariffPlan::find_by_id(&mut conn, intent.tariff_plan_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| PaymentError::NotFound("Tariff plan".to_string()))?;

        let amount = tariff_amount(plan.price_per_month, intent.duration_months)?;

        let new_payment = NewPayment {
            user_id: user.id,
            amount,
            payment_type: PaymentType::TariffSubscription.as_str().to_string(),
            payment_method: intent.payment_method.as_str().to_string(),
            status: PaymentStatus::Pending.as_str().to_string(),
            payment_url: None,
            payment_metadata: json!({
                "tariff_plan_id": plan.id.to_string(),
                "duration_months": intent.duration_months,
                "plan_name": plan.name,
            }),
        };

        let payment = self
            .insert_with_checkout(&mut conn, new_payment, intent.payment_method)
            .await?;
        info!(payment_id = %payment.id, amount, "Tariff payment created");
        Ok(payment)
    }

    /// Accept a paid featured placement for a service the caller owns
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn create_featured_payment(
        &self,
        user: &User,
        intent: FeatureIntent,
    ) -> Result<Payment, PaymentError> {
        let amount = featured_amount(intent.duration_days, self.config.featured_price_per_day)?;

        let mut conn = self.diesel_pool.get().await?;

        let merchant = Merchant::find_by_user_id(&mut conn, user.id)
            .await?
            .ok_or_else(|| PaymentError::Forbidden("Merchant profile required".to_string()))?;

        let service = Service::find_by_id(&mut conn, &intent.service_id)
            .await?
            .filter(|s| s.is_active)
            .ok_or_else(|| PaymentError::NotFound("Service".to_string()))?;

        if service.merchant_id != merchant.id {
            return Err(PaymentError::Forbidden(
                "Service belongs to another merchant".to_string(),
            ));
        }

        let new_payment = NewPayment {
            user_id: user.id,
            amount,
            payment_type: PaymentType::FeaturedService.as_str().to_string(),
            payment_method: intent.payment_method.as_str().to_string(),
            status: PaymentStatus::Pending.as_str().to_string(),
            payment_url: None,
            payment_metadata: json!({
                "service_id": service.id,
                "duration_days": intent.duration_days,
                "service_name": service.name,
            }),
        };

        let payment = self
            .insert_with_checkout(&mut conn, new_payment, intent.payment_method)
            .await?;
        info!(payment_id = %payment.id, amount, "Featured payment created");
        Ok(payment)
    }

    /// Insert the pending row and attach the provider checkout in one transaction
    async fn insert_with_checkout(
        &self,
        conn: &mut diesel_async::AsyncPgConnection,
        new_payment: NewPayment,
        method: PaymentMethod,
    ) -> Result<Payment, PaymentError> {
        let provider = self.providers.get(method)?;

        conn.transaction::<_, PaymentError, _>(|tx| {
            Box::pin(async move {
                let payment = Payment::create(tx, new_payment).await?;
                let checkout = provider.build_checkout(&payment).await?;

                let update = PaymentProviderUpdate {
                    payment_url: Some(checkout.payment_url),
                    ..Default::default()
                };
                Ok(Payment::apply_update(tx, payment.id, update).await?)
            })
        })
        .await
    }

    /// A payment owned by the given user
    pub async fn get_for_user(&self, user_id: Uuid, payment_id: Uuid) -> Result<Payment, PaymentError> {
        let mut conn = self.diesel_pool.get().await?;
        Payment::find_by_id(&mut conn, payment_id)
            .await?
            .filter(|p| p.user_id == user_id)
            .ok_or_else(|| PaymentError::NotFound("Payment".to_string()))
    }

    pub async fn list_tariffs(&self) -> Result<Vec<TariffPlan>, PaymentError> {
        let mut conn = self.diesel_pool.get().await?;
        Ok(TariffPlan::list_active(&mut conn).await?)
    }
}
