// Payment intents and payment lookups for the signed-in user

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::ApiResponse;
use crate::{
    app::AppState,
    middleware::auth::AuthenticatedUser,
    models::PaymentMethod,
    services::payment::{FeatureIntent, PaymentSummary, TariffIntent},
    utils::ServiceError,
};

#[derive(Debug, Deserialize)]
pub struct TariffPaymentRequest {
    pub tariff_plan_id: Uuid,
    pub duration_months: i32,
    pub payment_method: String,
}

#[derive(Debug, Deserialize)]
pub struct FeaturedPaymentRequest {
    pub service_id: String,
    pub duration_days: i32,
    pub payment_method: String,
}

fn parse_method(raw: &str) -> Result<PaymentMethod, ServiceError> {
    PaymentMethod::from_string(raw.trim().to_lowercase().as_str()).ok_or_else(|| {
        ServiceError::ValidationError(format!(
            "payment_method must be one of payme, click, uzum (got {})",
            raw
        ))
    })
}

/// POST /payments/tariff
pub async fn create_tariff_payment(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Json(request): Json<TariffPaymentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let intent = TariffIntent {
        tariff_plan_id: request.tariff_plan_id,
        duration_months: request.duration_months,
        payment_method: parse_method(&request.payment_method)?,
    };

    let payment = state
        .payment_service
        .create_tariff_payment(&auth_user.user, intent)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            PaymentSummary::from(&payment),
            "Payment created",
        )),
    ))
}

/// POST /payments/featured
pub async fn create_featured_payment(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Json(request): Json<FeaturedPaymentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let intent = FeatureIntent {
        service_id: request.service_id.trim().to_string(),
        duration_days: request.duration_days,
        payment_method: parse_method(&request.payment_method)?,
    };

    let payment = state
        .payment_service
        .create_featured_payment(&auth_user.user, intent)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            PaymentSummary::from(&payment),
            "Payment created",
        )),
    ))
}

/// GET /payments/{id}
pub async fn get_payment(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Path(payment_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let payment = state
        .payment_service
        .get_for_user(auth_user.user_id(), payment_id)
        .await?;

    Ok(Json(ApiResponse::ok(PaymentSummary::from(&payment), "Payment")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method() {
        assert_eq!(parse_method("Payme").unwrap(), PaymentMethod::Payme);
        assert_eq!(parse_method(" click ").unwrap(), PaymentMethod::Click);
        assert!(parse_method("cash").is_err());
    }
}
