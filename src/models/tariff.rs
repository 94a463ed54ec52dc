// Tariff plans: per-tier caps and feature flags

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::tariff_plans;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = tariff_plans)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TariffPlan {
    pub id: Uuid,
    pub name: String,
    /// Monthly price in tiyin
    pub price_per_month: i64,
    pub max_services: i32,
    pub max_images_per_service: i32,
    pub max_phone_numbers: i32,
    pub max_gallery_images: i32,
    pub max_social_accounts: i32,
    pub allow_website: bool,
    pub allow_cover_image: bool,
    pub monthly_featured_cards: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TariffPlan {
    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        plan_id: Uuid,
    ) -> Result<Option<Self>, diesel::result::Error> {
        tariff_plans::table
            .find(plan_id)
            .select(TariffPlan::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn find_active_by_name(
        conn: &mut AsyncPgConnection,
        name: &str,
    ) -> Result<Option<Self>, diesel::result::Error> {
        tariff_plans::table
            .filter(tariff_plans::name.eq(name))
            .filter(tariff_plans::is_active.eq(true))
            .select(TariffPlan::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn cheapest_active(
        conn: &mut AsyncPgConnection,
    ) -> Result<Option<Self>, diesel::result::Error> {
        tariff_plans::table
            .filter(tariff_plans::is_active.eq(true))
            .order(tariff_plans::price_per_month.asc())
            .select(TariffPlan::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn list_active(
        conn: &mut AsyncPgConnection,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        tariff_plans::table
            .filter(tariff_plans::is_active.eq(true))
            .order(tariff_plans::price_per_month.asc())
            .select(TariffPlan::as_select())
            .load(conn)
            .await
    }
}
