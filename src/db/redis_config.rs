use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Redis connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub redis_url: String,
    pub pool_size: u32,
    pub connection_timeout: Duration,
    pub command_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl RedisConfig {
    /// Build from the centralized application configuration
    pub fn from_app_config(config: &crate::app_config::RedisConfig) -> Self {
        Self {
            redis_url: config.url.clone(),
            pool_size: config.pool_size,
            connection_timeout: Duration::from_secs(config.connection_timeout),
            command_timeout: Duration::from_secs(config.command_timeout),
            retry_attempts: config.retry_attempts,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    /// Configuration for tests and tools that only know a URL
    pub fn for_url(url: &str) -> Self {
        Self {
            redis_url: url.to_string(),
            pool_size: 2,
            connection_timeout: Duration::from_secs(2),
            command_timeout: Duration::from_secs(2),
            retry_attempts: 1,
            retry_delay: Duration::from_millis(50),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.redis_url.is_empty() {
            return Err("Redis URL cannot be empty".to_string());
        }
        if self.pool_size == 0 {
            return Err("Pool size must be greater than 0".to_string());
        }
        if self.pool_size > 256 {
            return Err("Pool size too large (max: 256)".to_string());
        }
        if self.command_timeout.is_zero() {
            return Err("Command timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}
