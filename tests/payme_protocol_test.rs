// Payme merchant JSON-RPC endpoint driven end to end

mod common;

use axum::http::StatusCode;
use chrono::{Duration, NaiveDate, Utc};
use common::{
    execute_sql, merchant_id, payme_call, random_phone, register, setup_test_app, TestApp,
};
use serde_json::{json, Value};
use serial_test::serial;
use uuid::Uuid;

/// A pending Basic-tariff payment paid through Payme: (access token, payment id, amount)
async fn pending_payme_payment(app: &TestApp) -> (String, String, i64) {
    let access = register(app, &random_phone(), "merchant").await;

    let tariffs = app.get("/tariffs").send().await.json().await;
    let basic = tariffs["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["name"] == "Basic")
        .cloned()
        .unwrap();

    let res = app
        .post("/payments/tariff")
        .bearer(&access)
        .json(&json!({
            "tariff_plan_id": basic["id"],
            "duration_months": 1,
            "payment_method": "payme",
        }))
        .send()
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = res.json().await;
    let payment = &body["data"];
    assert_eq!(payment["status"], "pending");
    assert!(payment["payment_url"]
        .as_str()
        .unwrap()
        .starts_with("https://checkout.paycom.uz/"));

    (
        access,
        payment["payment_id"].as_str().unwrap().to_string(),
        payment["amount"].as_i64().unwrap(),
    )
}

/// Plan name and end date of the merchant's active subscription, None without one
async fn active_subscription(app: &TestApp, access: &str) -> Option<(String, NaiveDate)> {
    let res = app.get("/merchants/me/subscription").bearer(access).send().await;
    if res.status() == StatusCode::PAYMENT_REQUIRED {
        return None;
    }
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json().await;
    let end_date = body["data"]["end_date"].as_str().unwrap();
    Some((
        body["data"]["tariff"]["name"].as_str().unwrap().to_string(),
        NaiveDate::parse_from_str(end_date, "%Y-%m-%d").unwrap(),
    ))
}

async fn create_and_perform(app: &TestApp, order_id: &str, amount: i64) -> String {
    let txn = format!("payme-{}", Uuid::new_v4().simple());
    let reply = payme_call(
        app,
        "CreateTransaction",
        json!({
            "id": txn,
            "time": Utc::now().timestamp_millis(),
            "amount": amount,
            "account": { "order_id": order_id },
        }),
    )
    .await;
    assert_eq!(reply["result"]["state"], 1);

    let reply = payme_call(app, "PerformTransaction", json!({ "id": txn })).await;
    assert_eq!(reply["result"]["state"], 2);
    txn
}

fn error_code(reply: &Value) -> i64 {
    reply["error"]["code"].as_i64().unwrap_or_default()
}

#[tokio::test]
#[serial]
async fn test_rejects_bad_credentials_in_band() {
    let Some(app) = setup_test_app().await else {
        return;
    };

    let res = app
        .post("/payme/merchant")
        .header("authorization", "Basic d3Jvbmc6d3Jvbmc=")
        .json(&json!({ "jsonrpc": "2.0", "id": 7, "method": "CheckTransaction", "params": {} }))
        .send()
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let reply = res.json().await;
    assert_eq!(reply["id"], 7);
    assert_eq!(error_code(&reply), -32504);
}

#[tokio::test]
#[serial]
async fn test_unknown_method_and_missing_order() {
    let Some(app) = setup_test_app().await else {
        return;
    };

    let reply = payme_call(&app, "ChangePassword", json!({})).await;
    assert_eq!(error_code(&reply), -32601);

    let reply = payme_call(
        &app,
        "CheckPerformTransaction",
        json!({ "amount": 100, "account": { "order_id": Uuid::new_v4().to_string() } }),
    )
    .await;
    assert_eq!(error_code(&reply), -31050);
    assert_eq!(reply["error"]["data"], "order_id");
}

#[tokio::test]
#[serial]
async fn test_full_lifecycle_activates_and_reverses_tariff() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let (access, order_id, amount) = pending_payme_payment(&app).await;
    let account = json!({ "order_id": order_id });
    let (start_plan, start_end) = active_subscription(&app, &access).await.unwrap();
    assert_eq!(start_plan, "Start");

    let reply = payme_call(
        &app,
        "CheckPerformTransaction",
        json!({ "amount": amount + 100, "account": account }),
    )
    .await;
    assert_eq!(error_code(&reply), -31051);

    let reply = payme_call(
        &app,
        "CheckPerformTransaction",
        json!({ "amount": amount, "account": account }),
    )
    .await;
    assert_eq!(reply["result"]["allow"], true);

    let txn = format!("payme-{}", Uuid::new_v4().simple());
    let time = Utc::now().timestamp_millis();
    let create = json!({ "id": txn, "time": time, "amount": amount, "account": account });

    let reply = payme_call(&app, "CreateTransaction", create.clone()).await;
    assert_eq!(reply["result"]["state"], 1);
    assert_eq!(reply["result"]["transaction"], order_id.as_str());
    assert_eq!(reply["result"]["create_time"], time);

    // Same transaction again is idempotent
    let reply = payme_call(&app, "CreateTransaction", create).await;
    assert_eq!(reply["result"]["state"], 1);
    assert_eq!(reply["result"]["create_time"], time);

    // A second transaction for the same order is refused
    let other = json!({
        "id": format!("payme-{}", Uuid::new_v4().simple()),
        "time": time,
        "amount": amount,
        "account": account,
    });
    let reply = payme_call(&app, "CreateTransaction", other).await;
    assert_eq!(error_code(&reply), -31099);

    let reply = payme_call(&app, "PerformTransaction", json!({ "id": txn })).await;
    assert_eq!(reply["result"]["state"], 2);
    let perform_time = reply["result"]["perform_time"].clone();

    let reply = payme_call(&app, "PerformTransaction", json!({ "id": txn })).await;
    assert_eq!(error_code(&reply), -31007);

    let payment = app
        .get(&format!("/payments/{}", order_id))
        .bearer(&access)
        .send()
        .await
        .json()
        .await;
    assert_eq!(payment["data"]["status"], "completed");

    let subscription = app
        .get("/merchants/me/subscription")
        .bearer(&access)
        .send()
        .await
        .json()
        .await;
    assert_eq!(subscription["data"]["tariff"]["name"], "Basic");
    // One month on top of the running Start window
    let (_, paid_end) = active_subscription(&app, &access).await.unwrap();
    assert_eq!(paid_end, start_end + Duration::days(30));

    let reply = payme_call(&app, "CheckTransaction", json!({ "id": txn })).await;
    assert_eq!(reply["result"]["state"], 2);
    assert_eq!(reply["result"]["perform_time"], perform_time);
    assert!(reply["result"]["reason"].is_null());

    let reply = payme_call(&app, "CancelTransaction", json!({ "id": txn, "reason": 5 })).await;
    assert_eq!(reply["result"]["state"], -2);
    let cancel_time = reply["result"]["cancel_time"].clone();

    let reply = payme_call(&app, "CancelTransaction", json!({ "id": txn, "reason": 5 })).await;
    assert_eq!(reply["result"]["state"], -2);
    assert_eq!(reply["result"]["cancel_time"], cancel_time);

    let reply = payme_call(&app, "CheckTransaction", json!({ "id": txn })).await;
    assert_eq!(reply["result"]["state"], -2);
    assert_eq!(reply["result"]["reason"], 5);

    let payment = app
        .get(&format!("/payments/{}", order_id))
        .bearer(&access)
        .send()
        .await
        .json()
        .await;
    assert_eq!(payment["data"]["status"], "cancelled");

    // The refund takes the month back and restores the previous plan
    let (plan, end) = active_subscription(&app, &access).await.unwrap();
    assert_eq!(plan, "Start");
    assert_eq!(end, start_end);
}

#[tokio::test]
#[serial]
async fn test_refund_of_only_subscription_expires_it() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let (access, order_id, amount) = pending_payme_payment(&app).await;
    let merchant = merchant_id(&app, &access).await;
    execute_sql(
        &app,
        "DELETE FROM merchant_subscriptions WHERE merchant_id = $1",
        merchant,
    )
    .await;
    assert!(active_subscription(&app, &access).await.is_none());

    let txn = create_and_perform(&app, &order_id, amount).await;
    let today = Utc::now().date_naive();
    let (plan, end) = active_subscription(&app, &access).await.unwrap();
    assert_eq!(plan, "Basic");
    assert_eq!(end, today + Duration::days(30));

    let reply = payme_call(&app, "CancelTransaction", json!({ "id": txn, "reason": 5 })).await;
    assert_eq!(reply["result"]["state"], -2);

    assert!(active_subscription(&app, &access).await.is_none());
}

#[tokio::test]
#[serial]
async fn test_stale_create_time_is_refused() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let (_, order_id, amount) = pending_payme_payment(&app).await;
    let timeout_ms = app.state.config.payme.transaction_timeout_ms;

    let reply = payme_call(
        &app,
        "CreateTransaction",
        json!({
            "id": format!("payme-{}", Uuid::new_v4().simple()),
            "time": Utc::now().timestamp_millis() - timeout_ms - 60_000,
            "amount": amount,
            "account": { "order_id": order_id },
        }),
    )
    .await;
    assert_eq!(error_code(&reply), -31007);

    // The order is still open for a fresh transaction
    let reply = payme_call(
        &app,
        "CheckPerformTransaction",
        json!({ "amount": amount, "account": { "order_id": order_id } }),
    )
    .await;
    assert_eq!(reply["result"]["allow"], true);
}

#[tokio::test]
#[serial]
async fn test_perform_after_timeout_cancels_with_reason_4() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let (access, order_id, amount) = pending_payme_payment(&app).await;
    let timeout_ms = app.state.config.payme.transaction_timeout_ms;

    let txn = format!("payme-{}", Uuid::new_v4().simple());
    let reply = payme_call(
        &app,
        "CreateTransaction",
        json!({
            "id": txn,
            "time": Utc::now().timestamp_millis(),
            "amount": amount,
            "account": { "order_id": order_id },
        }),
    )
    .await;
    assert_eq!(reply["result"]["state"], 1);

    // Age the transaction past the provider timeout
    let order = Uuid::parse_str(&order_id).unwrap();
    let aged = execute_sql(
        &app,
        &format!(
            "UPDATE payments SET provider_create_time = provider_create_time - {} WHERE id = $1",
            timeout_ms + 60_000
        ),
        order,
    )
    .await;
    assert_eq!(aged, 1);

    let reply = payme_call(&app, "PerformTransaction", json!({ "id": txn })).await;
    assert_eq!(error_code(&reply), -31007);

    let reply = payme_call(&app, "CheckTransaction", json!({ "id": txn })).await;
    assert_eq!(reply["result"]["state"], -1);
    assert_eq!(reply["result"]["reason"], 4);

    let payment = app
        .get(&format!("/payments/{}", order_id))
        .bearer(&access)
        .send()
        .await
        .json()
        .await;
    assert_eq!(payment["data"]["status"], "cancelled");
}

#[tokio::test]
#[serial]
async fn test_cancel_before_perform() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let (_, order_id, amount) = pending_payme_payment(&app).await;

    let txn = format!("payme-{}", Uuid::new_v4().simple());
    let reply = payme_call(
        &app,
        "CreateTransaction",
        json!({
            "id": txn,
            "time": Utc::now().timestamp_millis(),
            "amount": amount,
            "account": { "order_id": order_id },
        }),
    )
    .await;
    assert_eq!(reply["result"]["state"], 1);

    let reply = payme_call(&app, "CancelTransaction", json!({ "id": txn, "reason": 3 })).await;
    assert_eq!(reply["result"]["state"], -1);

    let reply = payme_call(&app, "PerformTransaction", json!({ "id": txn })).await;
    assert_eq!(error_code(&reply), -31007);

    let reply = payme_call(&app, "CheckTransaction", json!({ "id": "payme-unknown" })).await;
    assert_eq!(error_code(&reply), -31003);
}
