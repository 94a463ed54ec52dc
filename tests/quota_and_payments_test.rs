// Tariff caps, free featured grants and payment intents

mod common;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{
    execute_sql, merchant_id, random_phone, register, seed_service, setup_test_app, switch_plan,
    TestApp,
};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde_json::json;
use serial_test::serial;
use uuid::Uuid;
use wedy_backend::models::{FeaturedService, Payment, PaymentProviderUpdate};
use wedy_backend::schema::featured_services;
use wedy_backend::services::payment::fulfillment;
use wedy_backend::services::quota::{Feature, LimitType, QuotaError, QuotaGuard};

/// Pending featured payment for the service; returns the payment id
async fn featured_payment(app: &TestApp, access: &str, service_id: &str, days: i64) -> Uuid {
    let res = app
        .post("/payments/featured")
        .bearer(access)
        .json(&json!({ "service_id": service_id, "duration_days": days, "payment_method": "click" }))
        .send()
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = res.json().await;
    Uuid::parse_str(body["data"]["payment_id"].as_str().unwrap()).unwrap()
}

/// Active placements of a service whose window covers `at`
async fn running_placements(app: &TestApp, service_id: &str, at: DateTime<Utc>) -> i64 {
    let mut conn = app.state.diesel_pool.get().await.unwrap();
    featured_services::table
        .filter(featured_services::service_id.eq(service_id))
        .filter(featured_services::is_active.eq(true))
        .filter(featured_services::start_date.le(at))
        .filter(featured_services::end_date.gt(at))
        .count()
        .get_result(&mut conn)
        .await
        .unwrap()
}

async fn placements(app: &TestApp, service_id: &str) -> Vec<FeaturedService> {
    let mut conn = app.state.diesel_pool.get().await.unwrap();
    featured_services::table
        .filter(featured_services::service_id.eq(service_id))
        .order(featured_services::start_date.asc())
        .select(FeaturedService::as_select())
        .load(&mut conn)
        .await
        .unwrap()
}

#[tokio::test]
#[serial]
async fn test_tariffs_are_public() {
    let Some(app) = setup_test_app().await else {
        return;
    };

    let res = app.get("/tariffs").send().await;
    assert_eq!(res.status(), StatusCode::OK);
    let names: Vec<String> = res.json().await["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect();
    assert!(names.contains(&"Start".to_string()));
    assert!(names.contains(&"Premium".to_string()));
}

#[tokio::test]
#[serial]
async fn test_start_tariff_has_no_free_featured_cards() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let access = register(&app, &random_phone(), "merchant").await;
    let service_id = seed_service(&app, &access).await;

    let res = app
        .post("/merchants/me/featured/free")
        .bearer(&access)
        .json(&json!({ "service_id": service_id }))
        .send()
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body = res.json().await;
    assert_eq!(body["error"]["code"], "QUOTA_EXCEEDED");
    assert_eq!(body["error"]["details"]["limit_type"], "monthly_featured_cards");
    assert_eq!(body["error"]["details"]["max_allowed"], 0);
    assert_eq!(body["error"]["details"]["tier_name"], "Start");
}

#[tokio::test]
#[serial]
async fn test_subscription_usage_counts_services() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let access = register(&app, &random_phone(), "merchant").await;
    seed_service(&app, &access).await;

    let body = app
        .get("/merchants/me/subscription")
        .bearer(&access)
        .send()
        .await
        .json()
        .await;
    let services = body["data"]["usage"]["limits"]
        .as_array()
        .unwrap()
        .iter()
        .find(|l| l["limit_type"] == "services")
        .cloned()
        .unwrap();
    assert_eq!(services["current"], 1);
    assert_eq!(services["max_allowed"], 1);
}

#[tokio::test]
#[serial]
async fn test_clients_cannot_use_merchant_routes() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let access = register(&app, &random_phone(), "client").await;

    let res = app.get("/merchants/me/subscription").bearer(&access).send().await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let tariffs = app.get("/tariffs").send().await.json().await;
    let plan_id = tariffs["data"][0]["id"].clone();
    let res = app
        .post("/payments/tariff")
        .bearer(&access)
        .json(&json!({ "tariff_plan_id": plan_id, "duration_months": 1, "payment_method": "click" }))
        .send()
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[serial]
async fn test_featured_payment_pricing_and_validation() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let access = register(&app, &random_phone(), "merchant").await;
    let service_id = seed_service(&app, &access).await;

    let res = app
        .post("/payments/featured")
        .bearer(&access)
        .json(&json!({ "service_id": service_id, "duration_days": 10, "payment_method": "click" }))
        .send()
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let payment = res.json().await["data"].clone();
    // 10 days at 20 000 so'm with the 10 % discount
    assert_eq!(payment["amount_uzs"], 180_000);
    assert_eq!(payment["payment_type"], "featured_service");
    assert!(payment["payment_url"]
        .as_str()
        .unwrap()
        .contains("amount=180000"));

    let res = app
        .post("/payments/featured")
        .bearer(&access)
        .json(&json!({ "service_id": service_id, "duration_days": 0, "payment_method": "click" }))
        .send()
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .post("/payments/featured")
        .bearer(&access)
        .json(&json!({ "service_id": service_id, "duration_days": 5, "payment_method": "cash" }))
        .send()
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[serial]
async fn test_payment_lookup_is_owner_only() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let owner = register(&app, &random_phone(), "merchant").await;
    let service_id = seed_service(&app, &owner).await;

    let payment = app
        .post("/payments/featured")
        .bearer(&owner)
        .json(&json!({ "service_id": service_id, "duration_days": 3, "payment_method": "uzum" }))
        .send()
        .await
        .json()
        .await;
    let payment_id = payment["data"]["payment_id"].as_str().unwrap().to_string();

    let res = app
        .get(&format!("/payments/{}", payment_id))
        .bearer(&owner)
        .send()
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let stranger = register(&app, &random_phone(), "client").await;
    let res = app
        .get(&format!("/payments/{}", payment_id))
        .bearer(&stranger)
        .send()
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[serial]
async fn test_second_placement_is_queued_behind_the_running_one() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let access = register(&app, &random_phone(), "merchant").await;
    let service_id = seed_service(&app, &access).await;

    let first = featured_payment(&app, &access, &service_id, 7).await;
    let second = featured_payment(&app, &access, &service_id, 3).await;

    let mut conn = app.state.diesel_pool.get().await.unwrap();
    for payment_id in [first, second] {
        let payment = Payment::find_by_id(&mut conn, payment_id).await.unwrap().unwrap();
        let completed = fulfillment::complete_payment(
            &mut conn,
            &payment,
            PaymentProviderUpdate::default(),
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(completed.status, "completed");
    }
    drop(conn);

    assert_eq!(running_placements(&app, &service_id, Utc::now()).await, 1);

    let rows = placements(&app, &service_id).await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].payment_id, Some(first));
    assert_eq!(rows[1].payment_id, Some(second));
    assert_eq!(rows[1].start_date, rows[0].end_date);
    assert_eq!(rows[1].end_date - rows[1].start_date, chrono::Duration::days(3));

    // A free grant on Basic lands after both paid windows
    let merchant = merchant_id(&app, &access).await;
    switch_plan(&app, merchant, "Basic").await;
    let res = app
        .post("/merchants/me/featured/free")
        .bearer(&access)
        .json(&json!({ "service_id": service_id }))
        .send()
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let granted = res.json().await["data"].clone();
    let start: DateTime<Utc> = serde_json::from_value(granted["start_date"].clone()).unwrap();
    assert_eq!(start, rows[1].end_date);
    assert_eq!(granted["feature_type"], "monthly_allocation");

    assert_eq!(running_placements(&app, &service_id, Utc::now()).await, 1);
}

#[tokio::test]
#[serial]
async fn test_service_cap_on_basic_reports_usage() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let access = register(&app, &random_phone(), "merchant").await;
    let merchant = merchant_id(&app, &access).await;
    switch_plan(&app, merchant, "Basic").await;

    for _ in 0..4 {
        seed_service(&app, &access).await;
    }
    let res = app.get("/merchants/me/quota/service").bearer(&access).send().await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json().await["data"]["allowed"], true);

    seed_service(&app, &access).await;
    let res = app.get("/merchants/me/quota/service").bearer(&access).send().await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body = res.json().await;
    assert_eq!(body["error"]["code"], "QUOTA_EXCEEDED");
    assert_eq!(body["error"]["details"]["limit_type"], "services");
    assert_eq!(body["error"]["details"]["current"], 5);
    assert_eq!(body["error"]["details"]["max_allowed"], 5);
    assert_eq!(body["error"]["details"]["tier_name"], "Basic");

    let mut conn = app.state.diesel_pool.get().await.unwrap();
    match QuotaGuard::may_create_service(&mut conn, merchant).await {
        Err(QuotaError::QuotaExceeded {
            limit_type,
            current,
            max_allowed,
            tier_name,
        }) => {
            assert_eq!(limit_type, LimitType::Services);
            assert_eq!((current, max_allowed), (5, 5));
            assert_eq!(tier_name, "Basic");
        },
        other => panic!("expected QuotaExceeded, got {:?}", other),
    }
}

#[tokio::test]
#[serial]
async fn test_website_and_cover_flags_follow_the_tariff() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let access = register(&app, &random_phone(), "merchant").await;
    let merchant = merchant_id(&app, &access).await;
    switch_plan(&app, merchant, "Basic").await;

    let res = app.get("/merchants/me/quota/website").bearer(&access).send().await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(res.json().await["error"]["code"], "FEATURE_NOT_AVAILABLE");

    let res = app.get("/merchants/me/quota/cover_image").bearer(&access).send().await;
    assert_eq!(res.status(), StatusCode::OK);

    let mut conn = app.state.diesel_pool.get().await.unwrap();
    match QuotaGuard::may_use_website(&mut conn, merchant).await {
        Err(QuotaError::FeatureForbidden { feature, tier_name }) => {
            assert_eq!(feature, Feature::Website);
            assert_eq!(tier_name, "Basic");
        },
        other => panic!("expected FeatureForbidden, got {:?}", other),
    }
    drop(conn);

    switch_plan(&app, merchant, "Premium").await;
    let res = app.get("/merchants/me/quota/website").bearer(&access).send().await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
#[serial]
async fn test_service_image_check_requires_own_service() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let owner = register(&app, &random_phone(), "merchant").await;
    let service_id = seed_service(&app, &owner).await;
    let other = register(&app, &random_phone(), "merchant").await;

    let res = app
        .get(&format!("/merchants/me/quota/service_image?service_id={}", service_id))
        .bearer(&owner)
        .send()
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .get(&format!("/merchants/me/quota/service_image?service_id={}", service_id))
        .bearer(&other)
        .send()
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let mut conn = app.state.diesel_pool.get().await.unwrap();
    let other_merchant = merchant_id(&app, &other).await;
    assert!(matches!(
        QuotaGuard::may_add_service_image(&mut conn, other_merchant, &service_id).await,
        Err(QuotaError::ServiceNotFound(_))
    ));

    let res = app
        .get("/merchants/me/quota/service_image")
        .bearer(&owner)
        .send()
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[serial]
async fn test_checks_without_subscription_need_payment() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let access = register(&app, &random_phone(), "merchant").await;
    let merchant = merchant_id(&app, &access).await;

    let res = app.get("/merchants/me/quota/phone").bearer(&access).send().await;
    assert_eq!(res.status(), StatusCode::OK);

    execute_sql(
        &app,
        "UPDATE merchant_subscriptions SET status = 'expired' WHERE merchant_id = $1",
        merchant,
    )
    .await;

    for action in ["phone", "social", "gallery_image"] {
        let res = app
            .get(&format!("/merchants/me/quota/{}", action))
            .bearer(&access)
            .send()
            .await;
        assert_eq!(res.status(), StatusCode::PAYMENT_REQUIRED, "{}", action);
        assert_eq!(res.json().await["error"]["code"], "SUBSCRIPTION_REQUIRED");
    }
}
