// Merchant profile owned by a merchant-role user

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::merchants;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = merchants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Merchant {
    pub id: Uuid,
    pub user_id: Uuid,
    pub business_name: Option<String>,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    pub website_url: Option<String>,
    pub location_region: Option<String>,
    pub is_verified: bool,
    pub overall_rating: f64,
    pub total_reviews: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = merchants)]
pub struct NewMerchant {
    pub user_id: Uuid,
    pub business_name: Option<String>,
    pub location_region: Option<String>,
}

impl Merchant {
    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_merchant: NewMerchant,
    ) -> Result<Self, diesel::result::Error> {
        diesel::insert_into(merchants::table)
            .values(&new_merchant)
            .returning(Merchant::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn find_by_user_id(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> Result<Option<Self>, diesel::result::Error> {
        merchants::table
            .filter(merchants::user_id.eq(user_id))
            .select(Merchant::as_select())
            .first(conn)
            .await
            .optional()
    }

    /// Row-lock the merchant of a user; serialises subscription mutations for that merchant
    pub async fn lock_by_user_id(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> Result<Option<Self>, diesel::result::Error> {
        merchants::table
            .filter(merchants::user_id.eq(user_id))
            .select(Merchant::as_select())
            .for_update()
            .first(conn)
            .await
            .optional()
    }

    pub async fn lock_by_id(
        conn: &mut AsyncPgConnection,
        merchant_id: Uuid,
    ) -> Result<Self, diesel::result::Error> {
        merchants::table
            .find(merchant_id)
            .select(Merchant::as_select())
            .for_update()
            .first(conn)
            .await
    }
}
