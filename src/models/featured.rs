// Featured placements of a service, free (monthly allocation) or paid

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::featured_services;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    MonthlyAllocation,
    PaidFeature,
}

impl FeatureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureType::MonthlyAllocation => "monthly_allocation",
            FeatureType::PaidFeature => "paid_feature",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "monthly_allocation" => Some(FeatureType::MonthlyAllocation),
            "paid_feature" => Some(FeatureType::PaidFeature),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = featured_services)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FeaturedService {
    pub id: Uuid,
    pub service_id: String,
    pub merchant_id: Uuid,
    pub payment_id: Option<Uuid>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub days_duration: i32,
    pub amount_paid: Option<i64>,
    pub feature_type: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = featured_services)]
pub struct NewFeaturedService {
    pub service_id: String,
    pub merchant_id: Uuid,
    pub payment_id: Option<Uuid>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub days_duration: i32,
    pub amount_paid: Option<i64>,
    pub feature_type: String,
    pub is_active: bool,
}

impl FeaturedService {
    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_featured: NewFeaturedService,
    ) -> Result<Self, diesel::result::Error> {
        diesel::insert_into(featured_services::table)
            .values(&new_featured)
            .returning(FeaturedService::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        featured_id: Uuid,
    ) -> Result<Option<Self>, diesel::result::Error> {
        featured_services::table
            .find(featured_id)
            .select(FeaturedService::as_select())
            .first(conn)
            .await
            .optional()
    }

    /// Where a new placement for the service starts: `now`, or the end of the last
    /// active placement still running or queued. Call with the merchant row locked.
    pub async fn next_window_start(
        conn: &mut AsyncPgConnection,
        service_id: &str,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, diesel::result::Error> {
        let latest_end: Option<DateTime<Utc>> = featured_services::table
            .filter(featured_services::service_id.eq(service_id))
            .filter(featured_services::is_active.eq(true))
            .filter(featured_services::end_date.gt(now))
            .select(diesel::dsl::max(featured_services::end_date))
            .get_result(conn)
            .await?;

        Ok(latest_end.map_or(now, |end| end.max(now)))
    }

    /// Deactivate a placement and pull its end back to `now` if it is running.
    pub async fn deactivate(
        conn: &mut AsyncPgConnection,
        featured: &FeaturedService,
        now: DateTime<Utc>,
    ) -> Result<Self, diesel::result::Error> {
        let end_date = running_end(featured.start_date, featured.end_date, now);
        diesel::update(featured_services::table.find(featured.id))
            .set((
                featured_services::is_active.eq(false),
                featured_services::end_date.eq(end_date),
            ))
            .returning(FeaturedService::as_returning())
            .get_result(conn)
            .await
    }

    /// Free grants created for a merchant within [from, to)
    pub async fn count_monthly_allocations(
        conn: &mut AsyncPgConnection,
        merchant_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64, diesel::result::Error> {
        featured_services::table
            .filter(featured_services::merchant_id.eq(merchant_id))
            .filter(featured_services::feature_type.eq(FeatureType::MonthlyAllocation.as_str()))
            .filter(featured_services::created_at.ge(from))
            .filter(featured_services::created_at.lt(to))
            .count()
            .get_result(conn)
            .await
    }
}

/// End of a deactivated window: cut to `now` only while `now` lies strictly inside it,
/// so the end always stays after the start.
pub fn running_end(
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    if start_date < now && now < end_date {
        now
    } else {
        end_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_running_end_keeps_window_non_empty() {
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap();
        let day = Duration::days(1);

        // running: cut to now
        assert_eq!(running_end(now - day, now + day, now), now);
        // already over: untouched
        assert_eq!(running_end(now - day * 3, now - day, now), now - day);
        // queued behind another placement: untouched
        assert_eq!(running_end(now + day, now + day * 2, now), now + day * 2);
        // starts exactly now: cutting would empty it
        assert_eq!(running_end(now, now + day, now), now + day);
    }
}
