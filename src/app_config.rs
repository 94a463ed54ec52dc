// Centralized configuration management for the Wedy backend
// Every environment variable is read ONCE at startup into a typed value

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Global application configuration loaded once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    // For tests, load .env file first
    #[cfg(test)]
    dotenv::dotenv().ok();

    AppConfig::from_env().expect("Failed to load configuration")
});

/// Regions a merchant may be located in
pub const UZBEKISTAN_REGIONS: &[&str] = &[
    "Tashkent",
    "Tashkent Region",
    "Andijan",
    "Bukhara",
    "Fergana",
    "Jizzakh",
    "Kashkadarya",
    "Khorezm",
    "Namangan",
    "Navoi",
    "Samarkand",
    "Sirdarya",
    "Surkhandarya",
    "Karakalpakstan",
];

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub debug: bool,
    pub disable_embedded_migrations: bool,
    pub cors_allowed_origins: Vec<String>,

    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub otp: OtpConfig,
    pub sms: SmsConfig,
    pub payme: PaymeConfig,
    pub click: ClickConfig,
    pub uzum: UzumConfig,
    pub payment: PaymentConfig,
    pub sweeps: SweepConfig,
    pub merchant: MerchantDefaults,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub rust_log: String,
}

/// Environment type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Environment {
    Development,
    Test,
    Staging,
    Production,
}

impl From<String> for Environment {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            "test" => Environment::Test,
            "staging" | "stage" => Environment::Staging,
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: u64,
    pub idle_timeout: u64,
    pub max_lifetime: u64,
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub pool_size: u32,
    pub connection_timeout: u64,
    pub command_timeout: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

/// Token policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(skip_serializing)]
    pub secret_key: String,
    pub algorithm: String,
    pub access_token_expire_minutes: u64,
    pub refresh_token_expire_days: u64,
}

/// One-time code policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpConfig {
    pub expire_minutes: u64,
    pub max_attempts: u32,
    pub attempts_window_seconds: u64,
    pub verified_ttl_seconds: u64,
    pub debug_code: String,
}

/// SMS gateway (Eskiz) credentials and retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsConfig {
    pub base_url: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub from: String,
    pub timeout_seconds: u64,
    pub notification_retries: u32,
    pub retry_delay_ms: u64,
}

/// Payme merchant settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymeConfig {
    pub merchant_id: String,
    #[serde(skip_serializing)]
    pub secret_key: String,
    pub login: String,
    pub api_url: String,
    pub transaction_timeout_ms: i64,
    pub lock_ttl_ms: u64,
}

/// Click merchant settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickConfig {
    pub service_id: String,
    pub merchant_id: String,
    #[serde(skip_serializing)]
    pub secret_key: String,
    pub merchant_user_id: String,
    pub base_url: String,
}

/// Uzumbank merchant settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UzumConfig {
    pub merchant_id: String,
    #[serde(skip_serializing)]
    pub secret_key: String,
    pub base_url: String,
}

/// Pricing and payment lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    pub return_url: String,
    /// Price of one featured day in so'm, before duration discounts
    pub featured_price_per_day: i64,
    pub pending_timeout_minutes: i64,
}

/// Background sweep intervals (seconds, never below one minute)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    pub subscription_interval_seconds: u64,
    pub pending_interval_seconds: u64,
}

/// Defaults applied when a merchant account is created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantDefaults {
    pub default_region: String,
    pub start_tariff_name: String,
    pub start_tariff_months: i32,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Helper function to get required env var
        let get_required = |key: &str| -> Result<String, ConfigError> {
            env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))
        };

        // Helper function to get optional env var with default
        let get_or_default = |key: &str, default: &str| -> String {
            env::var(key).unwrap_or_else(|_| default.to_string())
        };

        let parse_u32_or_default = |key: &str, default: &str| -> Result<u32, ConfigError> {
            get_or_default(key, default).parse().map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), "not a valid u32".to_string())
            })
        };

        let parse_u64_or_default = |key: &str, default: &str| -> Result<u64, ConfigError> {
            get_or_default(key, default).parse().map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), "not a valid u64".to_string())
            })
        };

        let parse_i64_or_default = |key: &str, default: &str| -> Result<i64, ConfigError> {
            get_or_default(key, default).parse().map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), "not a valid i64".to_string())
            })
        };

        let parse_bool_or_default = |key: &str, default: &str| -> bool {
            matches!(
                get_or_default(key, default).to_lowercase().as_str(),
                "true" | "1" | "yes"
            )
        };

        let environment = Environment::from(get_or_default("ENVIRONMENT", "development"));
        let debug = parse_bool_or_default("DEBUG", "false");

        // Parse bind address to extract port
        let bind_address = get_or_default("BIND_ADDRESS", "0.0.0.0:8000");
        let port = bind_address
            .rsplit(':')
            .next()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8000);

        let server = ServerConfig {
            bind_address,
            port,
            rust_log: get_or_default("RUST_LOG", "info"),
        };

        let database = DatabaseConfig {
            url: get_required("DATABASE_URL")?,
            max_connections: parse_u32_or_default("DATABASE_MAX_CONNECTIONS", "20")?,
            min_connections: parse_u32_or_default("DATABASE_MIN_CONNECTIONS", "2")?,
            connect_timeout: parse_u64_or_default("DATABASE_CONNECT_TIMEOUT", "30")?,
            idle_timeout: parse_u64_or_default("DATABASE_IDLE_TIMEOUT", "600")?,
            max_lifetime: parse_u64_or_default("DATABASE_MAX_LIFETIME", "1800")?,
        };

        let redis = RedisConfig {
            url: get_or_default("REDIS_URL", "redis://localhost:6379"),
            pool_size: parse_u32_or_default("REDIS_POOL_SIZE", "10")?,
            connection_timeout: parse_u64_or_default("REDIS_CONNECTION_TIMEOUT", "5")?,
            command_timeout: parse_u64_or_default("REDIS_COMMAND_TIMEOUT", "5")?,
            retry_attempts: parse_u32_or_default("REDIS_RETRY_ATTEMPTS", "3")?,
            retry_delay_ms: parse_u64_or_default("REDIS_RETRY_DELAY_MS", "100")?,
        };

        // Signing secret validation
        let secret_key = get_required("SECRET_KEY")?;
        if secret_key.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SECRET_KEY".to_string(),
                "Secret must not be empty".to_string(),
            ));
        }
        if environment != Environment::Development && secret_key.len() < 32 {
            return Err(ConfigError::InvalidValue(
                "SECRET_KEY".to_string(),
                "Secret must be at least 32 characters long".to_string(),
            ));
        }

        let algorithm = get_or_default("ALGORITHM", "HS256").to_uppercase();
        if !matches!(algorithm.as_str(), "HS256" | "HS384" | "HS512") {
            return Err(ConfigError::InvalidValue(
                "ALGORITHM".to_string(),
                format!("unsupported signing algorithm {}", algorithm),
            ));
        }

        let auth = AuthConfig {
            secret_key,
            algorithm,
            access_token_expire_minutes: parse_u64_or_default("ACCESS_TOKEN_EXPIRE_MINUTES", "15")?,
            refresh_token_expire_days: parse_u64_or_default("REFRESH_TOKEN_EXPIRE_DAYS", "30")?,
        };

        let otp = OtpConfig {
            expire_minutes: parse_u64_or_default("OTP_EXPIRE_MINUTES", "5")?,
            max_attempts: parse_u32_or_default("OTP_MAX_ATTEMPTS", "5")?,
            attempts_window_seconds: parse_u64_or_default("OTP_ATTEMPTS_WINDOW_SECONDS", "3600")?,
            verified_ttl_seconds: parse_u64_or_default("OTP_VERIFIED_TTL_SECONDS", "600")?,
            debug_code: get_or_default("OTP_DEBUG_CODE", "123456"),
        };

        let sms = SmsConfig {
            base_url: get_or_default("SMS_BASE_URL", "https://notify.eskiz.uz/api"),
            email: get_or_default("SMS_EMAIL", ""),
            password: get_or_default("SMS_PASSWORD", ""),
            from: get_or_default("SMS_FROM", "4546"),
            timeout_seconds: parse_u64_or_default("SMS_TIMEOUT_SECONDS", "30")?,
            notification_retries: parse_u32_or_default("SMS_NOTIFICATION_RETRIES", "3")?,
            retry_delay_ms: parse_u64_or_default("SMS_RETRY_DELAY_MS", "2000")?,
        };

        let payme = PaymeConfig {
            merchant_id: get_or_default("PAYME_MERCHANT_ID", ""),
            secret_key: get_or_default("PAYME_SECRET_KEY", ""),
            login: get_or_default("PAYME_LOGIN", "Paycom"),
            api_url: get_or_default("PAYME_API_URL", "https://checkout.paycom.uz"),
            transaction_timeout_ms: parse_i64_or_default("PAYME_TRANSACTION_TIMEOUT_MS", "43200000")?,
            lock_ttl_ms: parse_u64_or_default("PAYME_LOCK_TTL_MS", "10000")?,
        };

        let click = ClickConfig {
            service_id: get_or_default("CLICK_SERVICE_ID", ""),
            merchant_id: get_or_default("CLICK_MERCHANT_ID", ""),
            secret_key: get_or_default("CLICK_SECRET_KEY", ""),
            merchant_user_id: get_or_default("CLICK_MERCHANT_USER_ID", ""),
            base_url: get_or_default("CLICK_BASE_URL", "https://my.click.uz/services/pay"),
        };

        let uzum = UzumConfig {
            merchant_id: get_or_default("UZUMBANK_MERCHANT_ID", ""),
            secret_key: get_or_default("UZUMBANK_SECRET_KEY", ""),
            base_url: get_or_default("UZUMBANK_BASE_URL", "https://www.uzumbank.uz/open-service"),
        };

        let payment = PaymentConfig {
            return_url: get_or_default("PAYMENT_RETURN_URL", ""),
            featured_price_per_day: parse_i64_or_default("FEATURED_PRICE_PER_DAY", "20000")?,
            pending_timeout_minutes: parse_i64_or_default("PENDING_PAYMENT_TIMEOUT_MINUTES", "30")?,
        };
        if payment.featured_price_per_day <= 0 {
            return Err(ConfigError::InvalidValue(
                "FEATURED_PRICE_PER_DAY".to_string(),
                "must be positive".to_string(),
            ));
        }

        let sweeps = SweepConfig {
            subscription_interval_seconds: parse_u64_or_default(
                "SUBSCRIPTION_SWEEP_INTERVAL_SECONDS",
                "3600",
            )?
            .max(60),
            pending_interval_seconds: parse_u64_or_default("PENDING_SWEEP_INTERVAL_SECONDS", "300")?
                .max(60),
        };

        let default_region = get_or_default("DEFAULT_MERCHANT_REGION", "Tashkent");
        if !UZBEKISTAN_REGIONS.contains(&default_region.as_str()) {
            return Err(ConfigError::InvalidValue(
                "DEFAULT_MERCHANT_REGION".to_string(),
                format!("{} is not a known region", default_region),
            ));
        }

        let merchant = MerchantDefaults {
            default_region,
            start_tariff_name: get_or_default("START_TARIFF_NAME", "Start"),
            start_tariff_months: parse_u32_or_default("START_TARIFF_MONTHS", "2")? as i32,
        };

        let cors_allowed_origins: Vec<String> = get_or_default("CORS_ALLOWED_ORIGINS", "*")
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        Ok(Self {
            environment,
            debug,
            disable_embedded_migrations: parse_bool_or_default(
                "DISABLE_EMBEDDED_MIGRATIONS",
                "false",
            ),
            cors_allowed_origins,
            server,
            database,
            redis,
            auth,
            otp,
            sms,
            payme,
            click,
            uzum,
            payment,
            sweeps,
            merchant,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Check if running in development
    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

/// Get the global configuration instance
/// Only the outermost layer (main, initialize_app_state) should call this;
/// services receive their slice of the config at construction.
pub fn config() -> &'static AppConfig {
    &CONFIG
}
