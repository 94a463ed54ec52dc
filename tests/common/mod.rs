// Shared helpers for the integration tests
//
// Tests talk to a real PostgreSQL and Redis. When TEST_DATABASE_URL or TEST_REDIS_URL
// is unset, or either store is unreachable, `setup_test_app` returns None and the test
// returns early.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::Rng;
use serde::Serialize;
use diesel::sql_types::{Uuid as SqlUuid, Varchar};
use diesel_async::RunQueryDsl;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;
use wedy_backend::{
    app_config::AppConfig, build_router, initialize_app_state, AppState,
};

pub const PAYME_LOGIN: &str = "Paycom";
pub const PAYME_SECRET: &str = "test-payme-secret";
pub const DEBUG_OTP: &str = "123456";
pub const CLICK_SECRET: &str = "test-click-secret";
pub const UZUM_SECRET: &str = "test-uzum-secret";

/// Test application wrapper
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
}

impl TestApp {
    pub fn post(&self, uri: &str) -> TestRequest<'_> {
        TestRequest::new(self, "POST", uri)
    }

    pub fn get(&self, uri: &str) -> TestRequest<'_> {
        TestRequest::new(self, "GET", uri)
    }
}

/// Test request builder
pub struct TestRequest<'a> {
    app: &'a TestApp,
    builder: axum::http::request::Builder,
    body: Body,
}

impl<'a> TestRequest<'a> {
    fn new(app: &'a TestApp, method: &str, uri: &str) -> Self {
        Self {
            app,
            builder: Request::builder().method(method).uri(uri),
            body: Body::empty(),
        }
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Self {
        self.builder = self
            .builder
            .header(header::CONTENT_TYPE, "application/json");
        self.body = Body::from(serde_json::to_vec(body).unwrap());
        self
    }

    pub fn form(mut self, pairs: &[(&str, String)]) -> Self {
        let encoded = pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencode(v)))
            .collect::<Vec<_>>()
            .join("&");
        self.builder = self
            .builder
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        self.body = Body::from(encoded);
        self
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.builder = self
            .builder
            .header(header::AUTHORIZATION, format!("Bearer {}", token));
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    pub async fn send(self) -> TestResponse {
        let request = self.builder.body(self.body).unwrap();
        let response = self.app.app.clone().oneshot(request).await.unwrap();
        TestResponse { response }
    }
}

/// Test response wrapper
pub struct TestResponse {
    response: Response<Body>,
}

impl TestResponse {
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub async fn json(self) -> Value {
        let body = axum::body::to_bytes(self.response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }
}

fn urlencode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn test_config(overrides: &[(&str, &str)]) -> Option<AppConfig> {
    dotenv::from_filename(".env.test").ok();

    let database_url = std::env::var("TEST_DATABASE_URL").ok()?;
    let redis_url = std::env::var("TEST_REDIS_URL").ok()?;

    std::env::set_var("DATABASE_URL", database_url);
    std::env::set_var("REDIS_URL", redis_url);
    std::env::set_var("ENVIRONMENT", "test");
    std::env::set_var("DEBUG", "true");
    std::env::set_var("OTP_DEBUG_CODE", DEBUG_OTP);
    std::env::set_var("OTP_MAX_ATTEMPTS", "1000");
    std::env::set_var("SECRET_KEY", "integration-test-signing-secret-0123456789");
    std::env::set_var("PAYME_MERCHANT_ID", "test-merchant");
    std::env::set_var("PAYME_LOGIN", PAYME_LOGIN);
    std::env::set_var("PAYME_SECRET_KEY", PAYME_SECRET);
    std::env::set_var("CLICK_SERVICE_ID", "1001");
    std::env::set_var("CLICK_MERCHANT_ID", "2002");
    std::env::set_var("CLICK_SECRET_KEY", CLICK_SECRET);
    std::env::set_var("UZUMBANK_MERCHANT_ID", "3003");
    std::env::set_var("UZUMBANK_SECRET_KEY", UZUM_SECRET);
    std::env::set_var("REDIS_RETRY_ATTEMPTS", "0");
    std::env::set_var("DATABASE_CONNECT_TIMEOUT", "3");
    for (key, value) in overrides {
        std::env::set_var(key, value);
    }

    AppConfig::from_env().ok()
}

/// Full application against the test stores, or None when they are unavailable
pub async fn setup_test_app() -> Option<TestApp> {
    setup_test_app_with(&[]).await
}

/// Like `setup_test_app` with some environment settings replaced
pub async fn setup_test_app_with(overrides: &[(&str, &str)]) -> Option<TestApp> {
    let config = test_config(overrides)?;
    let state = match initialize_app_state(&config).await {
        Ok(state) => state,
        Err(e) => {
            eprintln!("skipping: test stores unavailable ({})", e);
            return None;
        },
    };

    Some(TestApp {
        app: build_router(state.clone()),
        state,
    })
}

/// Nine-digit local number unlikely to collide with other runs
pub fn random_phone() -> String {
    let mut rng = rand::thread_rng();
    format!("99{:07}", rng.gen_range(0..10_000_000))
}

/// Register a fresh account through the OTP flow and return its access token
pub async fn register(app: &TestApp, phone: &str, user_type: &str) -> String {
    let res = app.post("/auth/send-otp").json(&json!({ "phone": phone })).send().await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .post("/auth/verify-otp")
        .json(&json!({ "phone": phone, "otp_code": DEBUG_OTP }))
        .send()
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json().await["is_new_user"], true);

    let res = app
        .post("/auth/complete-registration")
        .json(&json!({ "phone": phone, "name": "Test Account", "user_type": user_type }))
        .send()
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await["access_token"]
        .as_str()
        .unwrap()
        .to_string()
}

pub fn payme_authorization() -> String {
    format!(
        "Basic {}",
        STANDARD.encode(format!("{}:{}", PAYME_LOGIN, PAYME_SECRET))
    )
}

/// One JSON-RPC call to the Payme endpoint; the reply body
pub async fn payme_call(app: &TestApp, method: &str, params: Value) -> Value {
    let res = app
        .post("/payme/merchant")
        .header("authorization", &payme_authorization())
        .json(&json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params }))
        .send()
        .await;
    assert_eq!(res.status(), StatusCode::OK, "Payme replies are always HTTP 200");
    res.json().await
}

/// Merchant profile id behind an access token
pub async fn merchant_id(app: &TestApp, access: &str) -> Uuid {
    let me = app.get("/auth/me").bearer(access).send().await.json().await;
    Uuid::parse_str(me["merchant_id"].as_str().unwrap()).unwrap()
}

/// Insert an active service for the merchant behind the token; returns its id
pub async fn seed_service(app: &TestApp, access: &str) -> String {
    let merchant_id = merchant_id(app, access).await;
    let service_id = format!("T{:08}", rand::thread_rng().gen_range(0..100_000_000));

    let mut conn = app.state.diesel_pool.get().await.unwrap();
    diesel::sql_query(
        "INSERT INTO services (id, merchant_id, name, description, price, location_region) \
         VALUES ($1, $2, 'Photo studio', 'Wedding photography', 500000000, 'Tashkent')",
    )
    .bind::<Varchar, _>(&service_id)
    .bind::<SqlUuid, _>(merchant_id)
    .execute(&mut conn)
    .await
    .unwrap();

    service_id
}

/// Move the merchant's active subscription onto another seeded plan
pub async fn switch_plan(app: &TestApp, merchant_id: Uuid, plan_name: &str) {
    let mut conn = app.state.diesel_pool.get().await.unwrap();
    let updated = diesel::sql_query(
        "UPDATE merchant_subscriptions \
         SET tariff_plan_id = (SELECT id FROM tariff_plans WHERE name = $1) \
         WHERE merchant_id = $2 AND status = 'active'",
    )
    .bind::<Varchar, _>(plan_name)
    .bind::<SqlUuid, _>(merchant_id)
    .execute(&mut conn)
    .await
    .unwrap();
    assert_eq!(updated, 1);
}

/// Run one statement against the test database; returns affected rows
pub async fn execute_sql(app: &TestApp, sql: &str, id: Uuid) -> usize {
    let mut conn = app.state.diesel_pool.get().await.unwrap();
    diesel::sql_query(sql)
        .bind::<SqlUuid, _>(id)
        .execute(&mut conn)
        .await
        .unwrap()
}
