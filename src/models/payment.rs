use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::schema::payments;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = payments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64, // tiyin
    pub payment_type: String,
    pub payment_method: String,
    pub status: String,
    pub transaction_id: Option<String>,
    pub payment_url: Option<String>,
    pub provider_state: Option<i16>,
    pub provider_create_time: Option<i64>,
    pub provider_perform_time: Option<i64>,
    pub provider_cancel_time: Option<i64>,
    pub cancel_reason: Option<i32>,
    pub webhook_data: Option<JsonValue>,
    pub payment_metadata: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payments)]
pub struct NewPayment {
    pub user_id: Uuid,
    pub amount: i64,
    pub payment_type: String,
    pub payment_method: String,
    pub status: String,
    pub payment_url: Option<String>,
    pub payment_metadata: JsonValue,
}

/// Provider-side bookkeeping written back onto a payment row.
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = payments)]
pub struct PaymentProviderUpdate {
    pub status: Option<String>,
    pub transaction_id: Option<String>,
    pub payment_url: Option<String>,
    pub provider_state: Option<i16>,
    pub provider_create_time: Option<i64>,
    pub provider_perform_time: Option<i64>,
    pub provider_cancel_time: Option<i64>,
    pub cancel_reason: Option<i32>,
    pub webhook_data: Option<JsonValue>,
    pub payment_metadata: Option<JsonValue>,
    /// `Some(None)` clears the completion timestamp
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            "cancelled" => Some(PaymentStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    TariffSubscription,
    FeaturedService,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::TariffSubscription => "tariff_subscription",
            PaymentType::FeaturedService => "featured_service",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "tariff_subscription" => Some(PaymentType::TariffSubscription),
            "featured_service" => Some(PaymentType::FeaturedService),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Payme,
    Click,
    Uzum,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Payme => "payme",
            PaymentMethod::Click => "click",
            PaymentMethod::Uzum => "uzum",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "payme" => Some(PaymentMethod::Payme),
            "click" => Some(PaymentMethod::Click),
            "uzum" => Some(PaymentMethod::Uzum),
            _ => None,
        }
    }
}

impl Payment {
    pub fn status(&self) -> Option<PaymentStatus> {
        PaymentStatus::from_string(&self.status)
    }

    pub fn kind(&self) -> Option<PaymentType> {
        PaymentType::from_string(&self.payment_type)
    }

    pub fn method(&self) -> Option<PaymentMethod> {
        PaymentMethod::from_string(&self.payment_method)
    }

    pub fn is_pending(&self) -> bool {
        self.status() == Some(PaymentStatus::Pending)
    }

    pub fn is_completed(&self) -> bool {
        self.status() == Some(PaymentStatus::Completed)
    }

    /// String field from payment_metadata
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.payment_metadata.get(key).and_then(|v| v.as_str())
    }

    /// Integer field from payment_metadata
    pub fn metadata_i64(&self, key: &str) -> Option<i64> {
        self.payment_metadata.get(key).and_then(|v| v.as_i64())
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_payment: NewPayment,
    ) -> Result<Self, diesel::result::Error> {
        diesel::insert_into(payments::table)
            .values(&new_payment)
            .returning(Payment::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        payment_id: Uuid,
    ) -> Result<Option<Self>, diesel::result::Error> {
        payments::table
            .find(payment_id)
            .select(Payment::as_select())
            .first(conn)
            .await
            .optional()
    }

    /// Row lock on the payment; call inside a transaction
    pub async fn lock_by_id(
        conn: &mut AsyncPgConnection,
        payment_id: Uuid,
    ) -> Result<Option<Self>, diesel::result::Error> {
        payments::table
            .find(payment_id)
            .select(Payment::as_select())
            .for_update()
            .first(conn)
            .await
            .optional()
    }

    /// Row lock on the payment bound to a provider transaction id
    pub async fn lock_by_transaction_id(
        conn: &mut AsyncPgConnection,
        method: PaymentMethod,
        transaction_id: &str,
    ) -> Result<Option<Self>, diesel::result::Error> {
        payments::table
            .filter(payments::payment_method.eq(method.as_str()))
            .filter(payments::transaction_id.eq(transaction_id))
            .select(Payment::as_select())
            .for_update()
            .first(conn)
            .await
            .optional()
    }

    /// Payme payments whose provider create_time falls in [from, to], oldest first
    pub async fn list_payme_in_window(
        conn: &mut AsyncPgConnection,
        from: i64,
        to: i64,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        payments::table
            .filter(payments::payment_method.eq(PaymentMethod::Payme.as_str()))
            .filter(payments::provider_create_time.ge(from))
            .filter(payments::provider_create_time.le(to))
            .order(payments::provider_create_time.asc())
            .select(Payment::as_select())
            .load(conn)
            .await
    }

    pub async fn apply_update(
        conn: &mut AsyncPgConnection,
        payment_id: Uuid,
        mut update: PaymentProviderUpdate,
    ) -> Result<Self, diesel::result::Error> {
        update.updated_at = Some(Utc::now());
        diesel::update(payments::table.find(payment_id))
            .set(&update)
            .returning(Payment::as_returning())
            .get_result(conn)
            .await
    }

    /// Mark pending payments created before `cutoff` that never got a provider
    /// transaction as failed
    pub async fn fail_stale(
        conn: &mut AsyncPgConnection,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, diesel::result::Error> {
        diesel::update(
            payments::table
                .filter(payments::status.eq(PaymentStatus::Pending.as_str()))
                .filter(payments::transaction_id.is_null())
                .filter(payments::created_at.lt(cutoff)),
        )
        .set((
            payments::status.eq(PaymentStatus::Failed.as_str()),
            payments::updated_at.eq(Utc::now()),
        ))
        .execute(conn)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(metadata: JsonValue) -> Payment {
        let now = Utc::now();
        Payment {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            amount: 30_000_000,
            payment_type: "tariff_subscription".to_string(),
            payment_method: "payme".to_string(),
            status: "pending".to_string(),
            transaction_id: None,
            payment_url: None,
            provider_state: None,
            provider_create_time: None,
            provider_perform_time: None,
            provider_cancel_time: None,
            cancel_reason: None,
            webhook_data: None,
            payment_metadata: metadata,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    #[test]
    fn test_enum_strings_match_storage() {
        assert_eq!(PaymentStatus::from_string("completed"), Some(PaymentStatus::Completed));
        assert_eq!(PaymentStatus::from_string("refunded"), None);
        assert_eq!(PaymentType::FeaturedService.as_str(), "featured_service");
        assert_eq!(PaymentMethod::from_string("uzum"), Some(PaymentMethod::Uzum));
    }

    #[test]
    fn test_metadata_accessors() {
        let payment = sample(json!({"tariff_plan_id": "abc", "duration_months": 3}));
        assert!(payment.is_pending());
        assert_eq!(payment.kind(), Some(PaymentType::TariffSubscription));
        assert_eq!(payment.metadata_str("tariff_plan_id"), Some("abc"));
        assert_eq!(payment.metadata_i64("duration_months"), Some(3));
        assert_eq!(payment.metadata_i64("missing"), None);
    }
}
