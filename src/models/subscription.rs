// Merchant subscriptions binding a merchant to a tariff plan for a date window

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::tariff::TariffPlan;
use crate::schema::{merchant_subscriptions, tariff_plans};

/// Days granted per purchased month
pub const DAYS_PER_MONTH: i64 = 30;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SubscriptionStatus::Active),
            "expired" => Some(SubscriptionStatus::Expired),
            "cancelled" => Some(SubscriptionStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = merchant_subscriptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MerchantSubscription {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub tariff_plan_id: Uuid,
    pub payment_id: Option<Uuid>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = merchant_subscriptions)]
pub struct NewMerchantSubscription {
    pub merchant_id: Uuid,
    pub tariff_plan_id: Uuid,
    pub payment_id: Option<Uuid>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: String,
}

impl MerchantSubscription {
    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_subscription: NewMerchantSubscription,
    ) -> Result<Self, diesel::result::Error> {
        diesel::insert_into(merchant_subscriptions::table)
            .values(&new_subscription)
            .returning(MerchantSubscription::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        subscription_id: Uuid,
    ) -> Result<Option<Self>, diesel::result::Error> {
        merchant_subscriptions::table
            .find(subscription_id)
            .select(MerchantSubscription::as_select())
            .first(conn)
            .await
            .optional()
    }

    /// The merchant's status=active subscription, if any
    pub async fn find_active(
        conn: &mut AsyncPgConnection,
        merchant_id: Uuid,
    ) -> Result<Option<Self>, diesel::result::Error> {
        merchant_subscriptions::table
            .filter(merchant_subscriptions::merchant_id.eq(merchant_id))
            .filter(merchant_subscriptions::status.eq(SubscriptionStatus::Active.as_str()))
            .select(MerchantSubscription::as_select())
            .first(conn)
            .await
            .optional()
    }

    /// Active subscription joined with its tariff plan
    pub async fn find_active_with_plan(
        conn: &mut AsyncPgConnection,
        merchant_id: Uuid,
    ) -> Result<Option<(Self, TariffPlan)>, diesel::result::Error> {
        merchant_subscriptions::table
            .inner_join(tariff_plans::table)
            .filter(merchant_subscriptions::merchant_id.eq(merchant_id))
            .filter(merchant_subscriptions::status.eq(SubscriptionStatus::Active.as_str()))
            .select((MerchantSubscription::as_select(), TariffPlan::as_select()))
            .first(conn)
            .await
            .optional()
    }

    /// Move the window end, switch plan and set status in one update
    pub async fn update_window(
        conn: &mut AsyncPgConnection,
        subscription_id: Uuid,
        tariff_plan_id: Uuid,
        end_date: NaiveDate,
        status: SubscriptionStatus,
    ) -> Result<Self, diesel::result::Error> {
        diesel::update(merchant_subscriptions::table.find(subscription_id))
            .set((
                merchant_subscriptions::tariff_plan_id.eq(tariff_plan_id),
                merchant_subscriptions::end_date.eq(end_date),
                merchant_subscriptions::status.eq(status.as_str()),
                merchant_subscriptions::updated_at.eq(Utc::now()),
            ))
            .returning(MerchantSubscription::as_returning())
            .get_result(conn)
            .await
    }

    /// Mark every active subscription whose window ended before `today` as expired
    pub async fn expire_ended(
        conn: &mut AsyncPgConnection,
        today: NaiveDate,
    ) -> Result<usize, diesel::result::Error> {
        diesel::update(
            merchant_subscriptions::table
                .filter(merchant_subscriptions::status.eq(SubscriptionStatus::Active.as_str()))
                .filter(merchant_subscriptions::end_date.lt(today)),
        )
        .set((
            merchant_subscriptions::status.eq(SubscriptionStatus::Expired.as_str()),
            merchant_subscriptions::updated_at.eq(Utc::now()),
        ))
        .execute(conn)
        .await
    }
}
