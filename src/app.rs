// Application state shared across handlers
use std::sync::Arc;

use crate::{
    app_config::AppConfig,
    db::DieselPool,
    services::{AuthService, JwtService, PaymentService, QuotaGuard},
    RedisPool,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub diesel_pool: DieselPool,
    pub redis_pool: RedisPool,
    pub jwt_service: Arc<JwtService>,
    pub auth_service: AuthService,
    pub quota_guard: QuotaGuard,
    pub payment_service: Arc<PaymentService>,
}
