// Tariff quota enforcement
//
// Every check resolves the merchant's active subscription and its plan, counts the
// relevant resources and compares them to the plan's cap. Nothing here writes.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use diesel_async::AsyncPgConnection;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::db::DieselPool;
use crate::models::catalogue::{
    count_active_contacts, count_active_images, count_active_services, ContactType, ImageType,
    Service,
};
use crate::models::{FeaturedService, MerchantSubscription, TariffPlan};

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("An active subscription is required")]
    SubscriptionRequired,

    #[error("{limit_type} limit reached ({current}/{max_allowed}) on tariff {tier_name}")]
    QuotaExceeded {
        limit_type: LimitType,
        current: i64,
        max_allowed: i64,
        tier_name: String,
    },

    #[error("Tariff {tier_name} does not include {feature}")]
    FeatureForbidden { feature: Feature, tier_name: String },

    #[error("Service {0} not found for this merchant")]
    ServiceNotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Pool error: {0}")]
    Pool(String),
}

impl From<bb8::RunError<diesel_async::pooled_connection::PoolError>> for QuotaError {
    fn from(e: bb8::RunError<diesel_async::pooled_connection::PoolError>) -> Self {
        QuotaError::Pool(e.to_string())
    }
}

// =============================================================================
// LIMITS
// =============================================================================

/// Countable resources capped per tariff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitType {
    Services,
    ServiceImages,
    PhoneNumbers,
    SocialAccounts,
    GalleryImages,
    MonthlyFeaturedCards,
}

impl LimitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitType::Services => "services",
            LimitType::ServiceImages => "service_images",
            LimitType::PhoneNumbers => "phone_numbers",
            LimitType::SocialAccounts => "social_accounts",
            LimitType::GalleryImages => "gallery_images",
            LimitType::MonthlyFeaturedCards => "monthly_featured_cards",
        }
    }

    /// The plan's cap for this resource
    pub fn cap(&self, plan: &TariffPlan) -> i64 {
        i64::from(match self {
            LimitType::Services => plan.max_services,
            LimitType::ServiceImages => plan.max_images_per_service,
            LimitType::PhoneNumbers => plan.max_phone_numbers,
            LimitType::SocialAccounts => plan.max_social_accounts,
            LimitType::GalleryImages => plan.max_gallery_images,
            LimitType::MonthlyFeaturedCards => plan.monthly_featured_cards,
        })
    }
}

impl fmt::Display for LimitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary tariff feature flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Website,
    CoverImage,
}

impl Feature {
    pub fn allowed_by(&self, plan: &TariffPlan) -> bool {
        match self {
            Feature::Website => plan.allow_website,
            Feature::CoverImage => plan.allow_cover_image,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Feature::Website => "website",
            Feature::CoverImage => "cover_image",
        })
    }
}

/// Refuse when `current` already reached the plan's cap
pub fn check_cap(limit_type: LimitType, current: i64, plan: &TariffPlan) -> Result<(), QuotaError> {
    let max_allowed = limit_type.cap(plan);
    if current >= max_allowed {
        return Err(QuotaError::QuotaExceeded {
            limit_type,
            current,
            max_allowed,
            tier_name: plan.name.clone(),
        });
    }
    Ok(())
}

/// Start and end of the UTC calendar month containing `at`
pub fn month_bounds(at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let (year, month) = (at.year(), at.month());
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let start = Utc
        .with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or(at);
    let end = Utc
        .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
        .single()
        .unwrap_or(at);
    (start, end)
}

/// A resource-creating action a merchant may ask about ahead of time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaAction {
    CreateService,
    AddServiceImage { service_id: String },
    AddPhone,
    AddSocial,
    AddGalleryImage,
    UseWebsite,
    UseCoverImage,
    GrantFreeFeature,
}

impl QuotaAction {
    /// Parse the action name used in URLs; service images need the service id
    pub fn parse(name: &str, service_id: Option<&str>) -> Option<Self> {
        Some(match name {
            "service" => QuotaAction::CreateService,
            "service_image" => QuotaAction::AddServiceImage {
                service_id: service_id?.trim().to_string(),
            },
            "phone" => QuotaAction::AddPhone,
            "social" => QuotaAction::AddSocial,
            "gallery_image" => QuotaAction::AddGalleryImage,
            "website" => QuotaAction::UseWebsite,
            "cover_image" => QuotaAction::UseCoverImage,
            "free_feature" => QuotaAction::GrantFreeFeature,
            _ => return None,
        })
    }
}

// =============================================================================
// USAGE SNAPSHOT
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct LimitUsage {
    pub limit_type: LimitType,
    pub current: i64,
    pub max_allowed: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuotaUsage {
    pub tier_name: String,
    pub limits: Vec<LimitUsage>,
    pub allow_website: bool,
    pub allow_cover_image: bool,
}

// =============================================================================
// GUARD
// =============================================================================

#[derive(Clone)]
pub struct QuotaGuard {
    diesel_pool: DieselPool,
}

impl QuotaGuard {
    pub fn new(diesel_pool: DieselPool) -> Self {
        Self { diesel_pool }
    }

    /// Active subscription and plan, or SubscriptionRequired
    pub async fn active_plan(
        conn: &mut AsyncPgConnection,
        merchant_id: Uuid,
    ) -> Result<(MerchantSubscription, TariffPlan), QuotaError> {
        MerchantSubscription::find_active_with_plan(conn, merchant_id)
            .await?
            .ok_or(QuotaError::SubscriptionRequired)
    }

    pub async fn may_create_service(
        conn: &mut AsyncPgConnection,
        merchant_id: Uuid,
    ) -> Result<(), QuotaError> {
        let (_, plan) = Self::active_plan(conn, merchant_id).await?;
        let current = count_active_services(conn, merchant_id).await?;
        check_cap(LimitType::Services, current, &plan)
    }

    pub async fn may_add_service_image(
        conn: &mut AsyncPgConnection,
        merchant_id: Uuid,
        service_id: &str,
    ) -> Result<(), QuotaError> {
        let owned = Service::find_by_id(conn, service_id)
            .await?
            .is_some_and(|service| service.merchant_id == merchant_id);
        if !owned {
            return Err(QuotaError::ServiceNotFound(service_id.to_string()));
        }

        let (_, plan) = Self::active_plan(conn, merchant_id).await?;
        let current = count_active_images(conn, ImageType::ServiceImage, service_id).await?;
        check_cap(LimitType::ServiceImages, current, &plan)
    }

    pub async fn may_add_phone(
        conn: &mut AsyncPgConnection,
        merchant_id: Uuid,
    ) -> Result<(), QuotaError> {
        let (_, plan) = Self::active_plan(conn, merchant_id).await?;
        let current = count_active_contacts(conn, merchant_id, ContactType::Phone).await?;
        check_cap(LimitType::PhoneNumbers, current, &plan)
    }

    pub async fn may_add_social(
        conn: &mut AsyncPgConnection,
        merchant_id: Uuid,
    ) -> Result<(), QuotaError> {
        let (_, plan) = Self::active_plan(conn, merchant_id).await?;
        let current = count_active_contacts(conn, merchant_id, ContactType::SocialMedia).await?;
        check_cap(LimitType::SocialAccounts, current, &plan)
    }

    pub async fn may_add_gallery_image(
        conn: &mut AsyncPgConnection,
        merchant_id: Uuid,
    ) -> Result<(), QuotaError> {
        let (_, plan) = Self::active_plan(conn, merchant_id).await?;
        let current =
            count_active_images(conn, ImageType::MerchantGallery, &merchant_id.to_string()).await?;
        check_cap(LimitType::GalleryImages, current, &plan)
    }

    pub async fn may_use_website(
        conn: &mut AsyncPgConnection,
        merchant_id: Uuid,
    ) -> Result<(), QuotaError> {
        Self::may_use_feature(conn, merchant_id, Feature::Website).await
    }

    pub async fn may_use_cover_image(
        conn: &mut AsyncPgConnection,
        merchant_id: Uuid,
    ) -> Result<(), QuotaError> {
        Self::may_use_feature(conn, merchant_id, Feature::CoverImage).await
    }

    async fn may_use_feature(
        conn: &mut AsyncPgConnection,
        merchant_id: Uuid,
        feature: Feature,
    ) -> Result<(), QuotaError> {
        let (_, plan) = Self::active_plan(conn, merchant_id).await?;
        if !feature.allowed_by(&plan) {
            return Err(QuotaError::FeatureForbidden {
                feature,
                tier_name: plan.name,
            });
        }
        Ok(())
    }

    /// Free featured grants already created in the month containing `at`
    pub async fn may_grant_free_feature(
        conn: &mut AsyncPgConnection,
        merchant_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), QuotaError> {
        let (_, plan) = Self::active_plan(conn, merchant_id).await?;
        let (from, to) = month_bounds(at);
        let current = FeaturedService::count_monthly_allocations(conn, merchant_id, from, to).await?;
        debug!(%merchant_id, current, "Monthly featured allocations");
        check_cap(LimitType::MonthlyFeaturedCards, current, &plan)
    }

    /// Pool-backed check for read-only callers that only ask whether an action would pass
    pub async fn check(&self, merchant_id: Uuid, action: &QuotaAction) -> Result<(), QuotaError> {
        let mut conn = self.diesel_pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut conn;
        match action {
            QuotaAction::CreateService => Self::may_create_service(conn, merchant_id).await,
            QuotaAction::AddServiceImage { service_id } => {
                Self::may_add_service_image(conn, merchant_id, service_id).await
            },
            QuotaAction::AddPhone => Self::may_add_phone(conn, merchant_id).await,
            QuotaAction::AddSocial => Self::may_add_social(conn, merchant_id).await,
            QuotaAction::AddGalleryImage => Self::may_add_gallery_image(conn, merchant_id).await,
            QuotaAction::UseWebsite => Self::may_use_website(conn, merchant_id).await,
            QuotaAction::UseCoverImage => Self::may_use_cover_image(conn, merchant_id).await,
            QuotaAction::GrantFreeFeature => {
                Self::may_grant_free_feature(conn, merchant_id, Utc::now()).await
            },
        }
    }

    /// Current usage against every cap of the active plan
    pub async fn usage(
        &self,
        merchant_id: Uuid,
    ) -> Result<(MerchantSubscription, TariffPlan, QuotaUsage), QuotaError> {
        let mut conn = self.diesel_pool.get().await?;
        let (subscription, plan) = Self::active_plan(&mut conn, merchant_id).await?;

        let (from, to) = month_bounds(Utc::now());
        let counts = [
            (LimitType::Services, count_active_services(&mut conn, merchant_id).await?),
            (
                LimitType::PhoneNumbers,
                count_active_contacts(&mut conn, merchant_id, ContactType::Phone).await?,
            ),
            (
                LimitType::SocialAccounts,
                count_active_contacts(&mut conn, merchant_id, ContactType::SocialMedia).await?,
            ),
            (
                LimitType::GalleryImages,
                count_active_images(&mut conn, ImageType::MerchantGallery, &merchant_id.to_string())
                    .await?,
            ),
            (
                LimitType::MonthlyFeaturedCards,
                FeaturedService::count_monthly_allocations(&mut conn, merchant_id, from, to).await?,
            ),
        ];

        let usage = QuotaUsage {
            tier_name: plan.name.clone(),
            limits: counts
                .into_iter()
                .map(|(limit_type, current)| LimitUsage {
                    limit_type,
                    current,
                    max_allowed: limit_type.cap(&plan),
                })
                .collect(),
            allow_website: plan.allow_website,
            allow_cover_image: plan.allow_cover_image,
        };

        Ok((subscription, plan, usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> TariffPlan {
        let now = Utc::now();
        TariffPlan {
            id: Uuid::new_v4(),
            name: "Basic".to_string(),
            price_per_month: 15_000_000,
            max_services: 5,
            max_images_per_service: 10,
            max_phone_numbers: 2,
            max_gallery_images: 20,
            max_social_accounts: 3,
            allow_website: false,
            allow_cover_image: true,
            monthly_featured_cards: 1,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_cap_reached_is_refused_with_triple() {
        let plan = plan();
        assert!(check_cap(LimitType::Services, 4, &plan).is_ok());

        match check_cap(LimitType::Services, 5, &plan) {
            Err(QuotaError::QuotaExceeded {
                limit_type,
                current,
                max_allowed,
                tier_name,
            }) => {
                assert_eq!(limit_type, LimitType::Services);
                assert_eq!(current, 5);
                assert_eq!(max_allowed, 5);
                assert_eq!(tier_name, "Basic");
            },
            other => panic!("expected QuotaExceeded, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_cap_refuses_everything() {
        let mut plan = plan();
        plan.monthly_featured_cards = 0;
        assert!(check_cap(LimitType::MonthlyFeaturedCards, 0, &plan).is_err());
    }

    #[test]
    fn test_feature_flags() {
        let plan = plan();
        assert!(!Feature::Website.allowed_by(&plan));
        assert!(Feature::CoverImage.allowed_by(&plan));
        assert_eq!(Feature::CoverImage.to_string(), "cover_image");
    }

    #[test]
    fn test_quota_action_names() {
        assert_eq!(QuotaAction::parse("service", None), Some(QuotaAction::CreateService));
        assert_eq!(
            QuotaAction::parse("service_image", Some(" SVC000001 ")),
            Some(QuotaAction::AddServiceImage {
                service_id: "SVC000001".to_string()
            })
        );
        assert_eq!(QuotaAction::parse("service_image", None), None);
        assert_eq!(QuotaAction::parse("website", None), Some(QuotaAction::UseWebsite));
        assert_eq!(QuotaAction::parse("banner", None), None);
    }

    #[test]
    fn test_month_bounds() {
        let at = Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap();
        let (start, end) = month_bounds(at);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());

        let (start, end) = month_bounds(Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap());
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
    }
}
