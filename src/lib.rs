// Library exports for the Wedy marketplace backend

pub mod app;
pub mod app_config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod schema;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::trace::TraceLayer;
use tracing::info;

// Re-export commonly used types
pub use app::AppState;
pub use app_config::{AppConfig, CONFIG};
pub use db::{DieselPool, RedisConfig, RedisPool};
pub use middleware::{auth_middleware, AuthenticatedUser, CurrentMerchant};
pub use services::{
    AuthService, JwtConfig, JwtService, PaymentService, QuotaGuard, QuotaError,
};

use services::payment::{
    click::ClickProvider, payme::PaymeProvider, uzum::UzumProvider, ProviderRegistry,
};

/// Build pools, run migrations and wire every service
pub async fn initialize_app_state(
    config: &AppConfig,
) -> Result<AppState, Box<dyn std::error::Error + Send + Sync>> {
    info!("Initializing database pool...");
    let db_config = db::DieselDatabaseConfig::from_app_config(&config.database);
    let diesel_pool = db::create_diesel_pool(db_config).await?;

    if migrations::should_run_migrations(config) {
        info!("Running embedded migrations...");
        migrations::run_all_migrations(&config.database.url)
            .await
            .map_err(|e| format!("Migration failed: {}", e))?;
    }

    info!("Initializing Redis pool...");
    let redis_pool = RedisPool::new(RedisConfig::from_app_config(&config.redis)).await?;

    let jwt_service = Arc::new(JwtService::new(JwtConfig::from_app_config(&config.auth)?));
    let sms = services::build_sms_sender(&config.sms, config.debug)?;
    let otp = services::OtpService::new(redis_pool.clone(), config.otp.clone(), config.debug);

    let auth_service = AuthService::new(
        diesel_pool.clone(),
        otp,
        sms,
        jwt_service.clone(),
        config.merchant.clone(),
    );

    let return_url = config.payment.return_url.clone();
    let providers = ProviderRegistry::new()
        .register(Arc::new(PaymeProvider::new(
            diesel_pool.clone(),
            redis_pool.clone(),
            config.payme.clone(),
            return_url.clone(),
        )))
        .register(Arc::new(ClickProvider::new(
            diesel_pool.clone(),
            config.click.clone(),
            return_url,
        )))
        .register(Arc::new(UzumProvider::new(
            diesel_pool.clone(),
            config.uzum.clone(),
        )));

    let payment_service = Arc::new(PaymentService::new(
        diesel_pool.clone(),
        providers,
        config.payment.clone(),
    ));

    Ok(AppState {
        config: Arc::new(config.clone()),
        quota_guard: QuotaGuard::new(diesel_pool.clone()),
        diesel_pool,
        redis_pool,
        jwt_service,
        auth_service,
        payment_service,
    })
}

/// Full HTTP surface with tracing and CORS
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/auth", handlers::auth_routes(state.clone()))
        .nest("/tariffs", handlers::tariff_routes())
        .nest("/payments", handlers::payment_routes(state.clone()))
        .nest("/merchants", handlers::merchant_routes(state.clone()))
        .merge(handlers::provider_routes())
        .layer(from_fn_with_state(
            state.clone(),
            middleware::dynamic_cors_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Health check handler
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let mut overall_healthy = true;
    let timestamp = chrono::Utc::now().to_rfc3339();

    let postgres_health = match db::check_diesel_health(&state.diesel_pool).await {
        Ok(_) => serde_json::json!({
            "status": "healthy",
            "max_connections": state.config.database.max_connections,
            "error": null
        }),
        Err(e) => {
            overall_healthy = false;
            serde_json::json!({
                "status": "unhealthy",
                "error": format!("Database connection failed: {}", e)
            })
        },
    };

    let redis_health = state.redis_pool.health_check().await;
    if !redis_health.is_healthy {
        overall_healthy = false;
    }

    let response = serde_json::json!({
        "status": if overall_healthy { "healthy" } else { "degraded" },
        "service": "wedy-backend",
        "timestamp": timestamp,
        "components": {
            "postgresql": postgres_health,
            "redis": {
                "status": if redis_health.is_healthy { "healthy" } else { "unhealthy" },
                "latency_ms": redis_health.latency_ms,
                "error": redis_health.error
            }
        }
    });

    if overall_healthy {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}
