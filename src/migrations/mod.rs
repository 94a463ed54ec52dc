// Migration orchestrator
// Embedded in the application binary so containers need no migration tooling

pub mod diesel;

use std::error::Error;
use tracing::{error, info};

/// Run all embedded migrations against the configured database
pub async fn run_all_migrations(database_url: &str) -> Result<usize, Box<dyn Error + Send + Sync>> {
    info!("[MIGRATIONS] Running Diesel (PostgreSQL) migrations...");

    match diesel::run_migrations(database_url.to_string()).await {
        Ok(0) => {
            info!("[MIGRATIONS] Diesel migrations up to date");
            Ok(0)
        },
        Ok(applied_count) => {
            info!("[MIGRATIONS] Applied {} Diesel migrations", applied_count);
            Ok(applied_count)
        },
        Err(e) => {
            error!("[MIGRATIONS] Diesel migration failed: {}", e);
            Err(format!("Diesel migration failed: {}", e).into())
        },
    }
}

/// Check if migrations should run based on configuration
pub fn should_run_migrations(config: &crate::app_config::AppConfig) -> bool {
    !config.disable_embedded_migrations
}
