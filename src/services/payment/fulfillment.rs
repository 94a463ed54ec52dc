// Business effects of a completed payment and their reversal.
// Every function here expects to run inside the transaction that changes the payment status.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use diesel_async::AsyncPgConnection;
use serde_json::Value as JsonValue;
use tracing::{info, warn};
use uuid::Uuid;

use super::PaymentError;
use crate::models::catalogue::Service;
use crate::models::subscription::DAYS_PER_MONTH;
use crate::models::{
    FeatureType, FeaturedService, Merchant, MerchantSubscription, NewFeaturedService,
    NewMerchantSubscription, Payment, PaymentProviderUpdate, PaymentStatus, PaymentType,
    SubscriptionStatus, TariffPlan,
};

/// Result of granting subscription days to a merchant
#[derive(Debug, Clone)]
pub struct SubscriptionGrant {
    pub subscription: MerchantSubscription,
    /// How far the end date actually moved
    pub granted_days: i64,
    /// Plan the subscription was on before an upgrade, if it changed
    pub previous_tariff_plan_id: Option<Uuid>,
}

fn add_days(date: NaiveDate, days: i64) -> Result<NaiveDate, PaymentError> {
    date.checked_add_signed(Duration::days(days))
        .ok_or_else(|| PaymentError::Internal("date out of range".to_string()))
}

/// End date after removing a granted span: never before today, never before the start.
/// Returns the new end and whether the subscription is now over.
pub fn shortened_window(
    start_date: NaiveDate,
    end_date: NaiveDate,
    granted_days: i64,
    today: NaiveDate,
) -> (NaiveDate, bool) {
    let new_end = end_date
        .checked_sub_signed(Duration::days(granted_days))
        .unwrap_or(start_date);

    if new_end <= today {
        (new_end.max(today).max(start_date), true)
    } else {
        (new_end.max(start_date), false)
    }
}

/// Extend the merchant's active subscription or open a new one starting today.
/// Takes the merchant row lock so concurrent grants for one merchant serialise.
pub async fn grant_subscription_days(
    conn: &mut AsyncPgConnection,
    merchant_id: Uuid,
    plan: &TariffPlan,
    days: i64,
    payment_id: Option<Uuid>,
    today: NaiveDate,
) -> Result<SubscriptionGrant, PaymentError> {
    Merchant::lock_by_id(conn, merchant_id).await?;

    match MerchantSubscription::find_active(conn, merchant_id).await? {
        Some(active) => {
            // A window that already lapsed but was not swept restarts from today
            let base = active.end_date.max(today);
            let new_end = add_days(base, days)?;
            let granted_days = (new_end - active.end_date).num_days();
            let previous_tariff_plan_id =
                (active.tariff_plan_id != plan.id).then_some(active.tariff_plan_id);

            let subscription = MerchantSubscription::update_window(
                conn,
                active.id,
                plan.id,
                new_end,
                SubscriptionStatus::Active,
            )
            .await?;

            info!(
                subscription_id = %subscription.id,
                %new_end,
                "Extended subscription"
            );
            Ok(SubscriptionGrant {
                subscription,
                granted_days,
                previous_tariff_plan_id,
            })
        },
        None => {
            let subscription = MerchantSubscription::create(
                conn,
                NewMerchantSubscription {
                    merchant_id,
                    tariff_plan_id: plan.id,
                    payment_id,
                    start_date: today,
                    end_date: add_days(today, days)?,
                    status: SubscriptionStatus::Active.as_str().to_string(),
                },
            )
            .await?;

            info!(subscription_id = %subscription.id, "Created subscription");
            Ok(SubscriptionGrant {
                subscription,
                granted_days: days,
                previous_tariff_plan_id: None,
            })
        },
    }
}

fn metadata_uuid(payment: &Payment, key: &'static str) -> Result<Uuid, PaymentError> {
    payment
        .metadata_str(key)
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or_else(|| PaymentError::Internal(format!("payment {} has no {}", payment.id, key)))
}

fn metadata_i64(payment: &Payment, key: &'static str) -> Result<i64, PaymentError> {
    payment
        .metadata_i64(key)
        .ok_or_else(|| PaymentError::Internal(format!("payment {} has no {}", payment.id, key)))
}

/// Mark a pending payment completed and apply its effect.
/// `extra` is merged into the provider bookkeeping written with the status change.
pub async fn complete_payment(
    conn: &mut AsyncPgConnection,
    payment: &Payment,
    mut extra: PaymentProviderUpdate,
    now: DateTime<Utc>,
) -> Result<Payment, PaymentError> {
    let mut metadata = payment.payment_metadata.clone();

    match payment.kind() {
        Some(PaymentType::TariffSubscription) => {
            let plan_id = metadata_uuid(payment, "tariff_plan_id")?;
            let months = metadata_i64(payment, "duration_months")?;

            let plan = TariffPlan::find_by_id(conn, plan_id)
                .await?
                .ok_or_else(|| PaymentError::NotFound("Tariff plan".to_string()))?;
            let merchant = Merchant::lock_by_user_id(conn, payment.user_id)
                .await?
                .ok_or_else(|| PaymentError::NotFound("Merchant profile".to_string()))?;

            let grant = grant_subscription_days(
                conn,
                merchant.id,
                &plan,
                months * DAYS_PER_MONTH,
                Some(payment.id),
                now.date_naive(),
            )
            .await?;

            metadata["subscription_id"] = JsonValue::from(grant.subscription.id.to_string());
            metadata["granted_days"] = JsonValue::from(grant.granted_days);
            if let Some(previous) = grant.previous_tariff_plan_id {
                metadata["previous_tariff_plan_id"] = JsonValue::from(previous.to_string());
            }
        },
        Some(PaymentType::FeaturedService) => {
            let service_id = payment
                .metadata_str("service_id")
                .ok_or_else(|| PaymentError::Internal("payment has no service_id".to_string()))?
                .to_string();
            let days = metadata_i64(payment, "duration_days")?;

            let service = Service::find_by_id(conn, &service_id)
                .await?
                .ok_or_else(|| PaymentError::NotFound("Service".to_string()))?;

            // A service already featured gets the new window queued after the current one
            Merchant::lock_by_id(conn, service.merchant_id).await?;
            let start_date = FeaturedService::next_window_start(conn, &service.id, now).await?;

            let featured = FeaturedService::create(
                conn,
                NewFeaturedService {
                    service_id: service.id,
                    merchant_id: service.merchant_id,
                    payment_id: Some(payment.id),
                    start_date,
                    end_date: start_date + Duration::days(days),
                    days_duration: days as i32,
                    amount_paid: Some(payment.amount),
                    feature_type: FeatureType::PaidFeature.as_str().to_string(),
                    is_active: true,
                },
            )
            .await?;

            metadata["featured_service_id"] = JsonValue::from(featured.id.to_string());
        },
        None => {
            return Err(PaymentError::Internal(format!(
                "unknown payment type {}",
                payment.payment_type
            )))
        },
    }

    extra.status = Some(PaymentStatus::Completed.as_str().to_string());
    extra.completed_at = Some(Some(now));
    extra.payment_metadata = Some(metadata);

    let completed = Payment::apply_update(conn, payment.id, extra).await?;
    info!(payment_id = %completed.id, "Payment completed");
    Ok(completed)
}

/// Undo the effect recorded on a completed payment
pub async fn reverse_payment(
    conn: &mut AsyncPgConnection,
    payment: &Payment,
    now: DateTime<Utc>,
) -> Result<(), PaymentError> {
    match payment.kind() {
        Some(PaymentType::TariffSubscription) => {
            let subscription_id = metadata_uuid(payment, "subscription_id")?;
            let granted_days = metadata_i64(payment, "granted_days")?;

            let Some(subscription) = MerchantSubscription::find_by_id(conn, subscription_id).await?
            else {
                warn!(%subscription_id, "Subscription to reverse no longer exists");
                return Ok(());
            };
            Merchant::lock_by_id(conn, subscription.merchant_id).await?;

            let today = now.date_naive();
            let (end_date, ended) = shortened_window(
                subscription.start_date,
                subscription.end_date,
                granted_days,
                today,
            );

            let current = SubscriptionStatus::from_string(&subscription.status)
                .unwrap_or(SubscriptionStatus::Expired);
            let status = match current {
                SubscriptionStatus::Active if ended => SubscriptionStatus::Expired,
                other => other,
            };
            let plan_id = payment
                .metadata_str("previous_tariff_plan_id")
                .and_then(|v| Uuid::parse_str(v).ok())
                .unwrap_or(subscription.tariff_plan_id);

            MerchantSubscription::update_window(conn, subscription.id, plan_id, end_date, status)
                .await?;
            info!(%subscription_id, %end_date, status = status.as_str(), "Subscription reversed");
        },
        Some(PaymentType::FeaturedService) => {
            let featured_id = metadata_uuid(payment, "featured_service_id")?;
            match FeaturedService::find_by_id(conn, featured_id).await? {
                Some(featured) => {
                    FeaturedService::deactivate(conn, &featured, now).await?;
                    info!(%featured_id, "Featured placement reversed");
                },
                None => warn!(%featured_id, "Featured placement to reverse no longer exists"),
            }
        },
        None => {
            return Err(PaymentError::Internal(format!(
                "unknown payment type {}",
                payment.payment_type
            )))
        },
    }

    Ok(())
}
