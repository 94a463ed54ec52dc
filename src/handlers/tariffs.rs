use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;
use uuid::Uuid;

use super::ApiResponse;
use crate::{app::AppState, models::TariffPlan, utils::ServiceError};

#[derive(Debug, Serialize)]
pub struct TariffInfo {
    pub id: Uuid,
    pub name: String,
    pub price_per_month: i64,
    pub price_per_month_uzs: i64,
    pub max_services: i32,
    pub max_images_per_service: i32,
    pub max_phone_numbers: i32,
    pub max_gallery_images: i32,
    pub max_social_accounts: i32,
    pub allow_website: bool,
    pub allow_cover_image: bool,
    pub monthly_featured_cards: i32,
}

impl From<TariffPlan> for TariffInfo {
    fn from(plan: TariffPlan) -> Self {
        Self {
            id: plan.id,
            name: plan.name,
            price_per_month: plan.price_per_month,
            price_per_month_uzs: plan.price_per_month / 100,
            max_services: plan.max_services,
            max_images_per_service: plan.max_images_per_service,
            max_phone_numbers: plan.max_phone_numbers,
            max_gallery_images: plan.max_gallery_images,
            max_social_accounts: plan.max_social_accounts,
            allow_website: plan.allow_website,
            allow_cover_image: plan.allow_cover_image,
            monthly_featured_cards: plan.monthly_featured_cards,
        }
    }
}

/// GET /tariffs
pub async fn list_tariffs(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let plans = state.payment_service.list_tariffs().await?;
    let data: Vec<TariffInfo> = plans.into_iter().map(TariffInfo::from).collect();
    Ok(Json(ApiResponse::ok(data, "Active tariff plans")))
}
