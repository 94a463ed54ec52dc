// Merchant self-service: subscription snapshot and the monthly free featured grant

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use diesel_async::AsyncConnection;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::{tariffs::TariffInfo, ApiResponse};
use crate::{
    app::AppState,
    middleware::auth::CurrentMerchant,
    models::{catalogue::Service, FeatureType, FeaturedService, Merchant, NewFeaturedService},
    services::quota::{QuotaAction, QuotaGuard, QuotaUsage},
    utils::ServiceError,
};

/// Length of a monthly-allocation placement
pub const FREE_FEATURE_DAYS: i32 = 30;

#[derive(Debug, Serialize)]
pub struct SubscriptionInfo {
    pub subscription_id: Uuid,
    pub status: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub tariff: TariffInfo,
    pub usage: QuotaUsage,
}

#[derive(Debug, Deserialize, Validate)]
pub struct FreeFeatureRequest {
    #[validate(length(min = 1, max = 9))]
    pub service_id: String,
}

#[derive(Debug, Deserialize)]
pub struct QuotaCheckQuery {
    pub service_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QuotaCheckResult {
    pub action: String,
    pub allowed: bool,
}

#[derive(Debug, Serialize)]
pub struct FeaturedInfo {
    pub featured_id: Uuid,
    pub service_id: String,
    pub feature_type: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub days_duration: i32,
}

impl From<FeaturedService> for FeaturedInfo {
    fn from(featured: FeaturedService) -> Self {
        Self {
            featured_id: featured.id,
            service_id: featured.service_id,
            feature_type: featured.feature_type,
            start_date: featured.start_date,
            end_date: featured.end_date,
            days_duration: featured.days_duration,
        }
    }
}

/// GET /merchants/me/subscription
pub async fn my_subscription(
    State(state): State<AppState>,
    current: CurrentMerchant,
) -> Result<impl IntoResponse, ServiceError> {
    let (subscription, plan, usage) = state.quota_guard.usage(current.merchant.id).await?;

    let info = SubscriptionInfo {
        subscription_id: subscription.id,
        status: subscription.status,
        start_date: subscription.start_date,
        end_date: subscription.end_date,
        tariff: TariffInfo::from(plan),
        usage,
    };

    Ok(Json(ApiResponse::ok(info, "Active subscription")))
}

/// GET /merchants/me/quota/{action}
///
/// Asks whether the action would pass the tariff right now; refusals come back as
/// the same 402/403 errors the mutation would return.
pub async fn check_quota(
    State(state): State<AppState>,
    current: CurrentMerchant,
    Path(action_name): Path<String>,
    Query(query): Query<QuotaCheckQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let action = QuotaAction::parse(&action_name, query.service_id.as_deref()).ok_or_else(|| {
        ServiceError::ValidationError(format!("Unknown quota action {}", action_name))
    })?;

    state.quota_guard.check(current.merchant.id, &action).await?;

    Ok(Json(ApiResponse::ok(
        QuotaCheckResult {
            action: action_name,
            allowed: true,
        },
        "Action allowed by the current tariff",
    )))
}

/// POST /merchants/me/featured/free
///
/// The quota check and the insert share one transaction holding the merchant row lock,
/// so two concurrent grants cannot both pass the monthly cap. A service that is already
/// featured gets the new window queued after its current one.
pub async fn grant_free_feature(
    State(state): State<AppState>,
    current: CurrentMerchant,
    Json(request): Json<FreeFeatureRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    request.validate()?;

    let merchant_id = current.merchant.id;
    let service_id = request.service_id.trim().to_string();
    let mut conn = state.diesel_pool.get().await?;

    let featured = conn
        .transaction::<_, ServiceError, _>(|tx| {
            Box::pin(async move {
                Merchant::lock_by_id(tx, merchant_id).await?;

                let now = Utc::now();
                QuotaGuard::may_grant_free_feature(tx, merchant_id, now).await?;

                let service = Service::find_by_id(tx, &service_id)
                    .await?
                    .filter(|s| s.is_active)
                    .ok_or_else(|| ServiceError::NotFound("Service".to_string()))?;
                if service.merchant_id != merchant_id {
                    return Err(ServiceError::Forbidden(
                        "Service belongs to another merchant".to_string(),
                    ));
                }

                let start_date = FeaturedService::next_window_start(tx, &service.id, now).await?;
                let featured = FeaturedService::create(
                    tx,
                    NewFeaturedService {
                        service_id: service.id,
                        merchant_id,
                        payment_id: None,
                        start_date,
                        end_date: start_date + Duration::days(FREE_FEATURE_DAYS as i64),
                        days_duration: FREE_FEATURE_DAYS,
                        amount_paid: None,
                        feature_type: FeatureType::MonthlyAllocation.as_str().to_string(),
                        is_active: true,
                    },
                )
                .await?;
                Ok(featured)
            })
        })
        .await?;

    info!(
        merchant_id = %merchant_id,
        featured_id = %featured.id,
        "Monthly featured placement granted"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            FeaturedInfo::from(featured),
            "Featured placement granted",
        )),
    ))
}
