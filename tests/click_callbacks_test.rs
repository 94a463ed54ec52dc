// Click prepare/complete callbacks for a featured placement

mod common;

use axum::http::StatusCode;
use common::{random_phone, register, setup_test_app, TestApp, CLICK_SECRET};
use diesel_async::RunQueryDsl;
use serde_json::{json, Value};
use serial_test::serial;
use uuid::Uuid;
use wedy_backend::services::payment::click::{
    click_signature, ClickParams, ACTION_COMPLETE, ACTION_PREPARE,
};

async fn pending_click_payment(app: &TestApp) -> (String, Value) {
    let access = register(app, &random_phone(), "merchant").await;
    let me = app.get("/auth/me").bearer(&access).send().await.json().await;
    let merchant_id = Uuid::parse_str(me["merchant_id"].as_str().unwrap()).unwrap();
    let service_id = format!("C{:08}", rand::random::<u32>() % 100_000_000);

    let mut conn = app.state.diesel_pool.get().await.unwrap();
    diesel::sql_query(
        "INSERT INTO services (id, merchant_id, name, location_region) \
         VALUES ($1, $2, 'Restaurant hall', 'Samarkand')",
    )
    .bind::<diesel::sql_types::Varchar, _>(&service_id)
    .bind::<diesel::sql_types::Uuid, _>(merchant_id)
    .execute(&mut conn)
    .await
    .unwrap();

    let payment = app
        .post("/payments/featured")
        .bearer(&access)
        .json(&json!({ "service_id": service_id, "duration_days": 7, "payment_method": "click" }))
        .send()
        .await
        .json()
        .await;
    (access, payment["data"].clone())
}

fn signed_form(
    click_trans_id: &str,
    payment_id: &str,
    prepare_id: Option<&str>,
    amount: &str,
    action: i32,
) -> Vec<(&'static str, String)> {
    let mut params = ClickParams {
        click_trans_id: click_trans_id.to_string(),
        service_id: "1001".to_string(),
        merchant_trans_id: payment_id.to_string(),
        merchant_prepare_id: prepare_id.map(str::to_string),
        amount: amount.to_string(),
        action,
        error: 0,
        sign_time: "2026-10-19 12:00:00".to_string(),
        sign_string: String::new(),
    };
    params.sign_string = click_signature(&params, CLICK_SECRET);

    let mut form = vec![
        ("click_trans_id", params.click_trans_id.clone()),
        ("service_id", params.service_id.clone()),
        ("click_paydoc_id", "555".to_string()),
        ("merchant_trans_id", params.merchant_trans_id.clone()),
        ("amount", params.amount.clone()),
        ("action", action.to_string()),
        ("error", "0".to_string()),
        ("error_note", "Success".to_string()),
        ("sign_time", params.sign_time.clone()),
        ("sign_string", params.sign_string.clone()),
    ];
    if let Some(prepare_id) = prepare_id {
        form.push(("merchant_prepare_id", prepare_id.to_string()));
    }
    form
}

#[tokio::test]
#[serial]
async fn test_prepare_and_complete_fulfil_the_payment() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let (access, payment) = pending_click_payment(&app).await;
    let payment_id = payment["payment_id"].as_str().unwrap();
    let amount = format!("{}.00", payment["amount_uzs"]);

    let res = app
        .post("/payments/click/prepare")
        .form(&signed_form("9001", payment_id, None, &amount, ACTION_PREPARE))
        .send()
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let reply = res.json().await;
    assert_eq!(reply["error"], 0);
    assert_eq!(reply["merchant_prepare_id"], payment_id);

    let res = app
        .post("/payments/click/complete")
        .form(&signed_form("9001", payment_id, Some(payment_id), &amount, ACTION_COMPLETE))
        .send()
        .await;
    let reply = res.json().await;
    assert_eq!(reply["error"], 0);
    assert_eq!(reply["merchant_confirm_id"], payment_id);

    let summary = app
        .get(&format!("/payments/{}", payment_id))
        .bearer(&access)
        .send()
        .await
        .json()
        .await;
    assert_eq!(summary["data"]["status"], "completed");

    // Completing again reports the payment as already paid
    let reply = app
        .post("/payments/click/complete")
        .form(&signed_form("9001", payment_id, Some(payment_id), &amount, ACTION_COMPLETE))
        .send()
        .await
        .json()
        .await;
    assert_eq!(reply["error"], -4);
}

#[tokio::test]
#[serial]
async fn test_bad_signature_and_amount_are_refused_in_band() {
    let Some(app) = setup_test_app().await else {
        return;
    };
    let (_, payment) = pending_click_payment(&app).await;
    let payment_id = payment["payment_id"].as_str().unwrap();
    let amount = format!("{}.00", payment["amount_uzs"]);

    let mut form = signed_form("9002", payment_id, None, &amount, ACTION_PREPARE);
    for (key, value) in form.iter_mut() {
        if *key == "sign_string" {
            *value = "0".repeat(32);
        }
    }
    let res = app.post("/payments/click/prepare").form(&form).send().await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json().await["error"], -1);

    let reply = app
        .post("/payments/click/prepare")
        .form(&signed_form("9002", payment_id, None, "1.00", ACTION_PREPARE))
        .send()
        .await
        .json()
        .await;
    assert_eq!(reply["error"], -2);

    let reply = app
        .post("/payments/click/prepare")
        .form(&signed_form("9002", &Uuid::new_v4().to_string(), None, &amount, ACTION_PREPARE))
        .send()
        .await
        .json()
        .await;
    assert_eq!(reply["error"], -5);
}
