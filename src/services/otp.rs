// One-time code storage and verification in Redis
// Keys: otp:{phone} holds the code, otp_attempts:{phone} counts issuances,
// otp_verified:{phone} marks a phone that passed verification and may register.

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::app_config::OtpConfig;
use crate::db::{CapCheck, CodeCheck, RedisPool};
use crate::utils::mask_phone;

pub const CODE_LENGTH: usize = 6;

#[derive(Error, Debug)]
pub enum OtpError {
    #[error("Too many code requests")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Invalid or expired code")]
    InvalidCode,

    #[error("Redis error: {0}")]
    RedisError(String),
}

impl From<redis::RedisError> for OtpError {
    fn from(e: redis::RedisError) -> Self {
        OtpError::RedisError(e.to_string())
    }
}

/// Code record stored under `otp:{phone}`
#[derive(Debug, Serialize, Deserialize)]
pub struct StoredCode {
    pub code: String,
    pub issued_at: i64,
}

/// A freshly stored code, ready for delivery
#[derive(Debug, Clone)]
pub struct IssuedCode {
    pub code: String,
    pub ttl_minutes: u64,
}

pub fn code_key(phone: &str) -> String {
    format!("otp:{}", phone)
}

pub fn attempts_key(phone: &str) -> String {
    format!("otp_attempts:{}", phone)
}

pub fn verified_key(phone: &str) -> String {
    format!("otp_verified:{}", phone)
}

/// Six random digits, leading zeros allowed
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Whether a user-supplied code has the right shape
pub fn is_well_formed(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.chars().all(|c| c.is_ascii_digit())
}

#[derive(Clone)]
pub struct OtpService {
    redis_pool: RedisPool,
    config: OtpConfig,
    debug: bool,
}

impl OtpService {
    pub fn new(redis_pool: RedisPool, config: OtpConfig, debug: bool) -> Self {
        Self {
            redis_pool,
            config,
            debug,
        }
    }

    pub fn ttl_minutes(&self) -> u64 {
        self.config.expire_minutes
    }

    /// Count the issuance, then store a new code for the phone.
    /// The cap check and the increment are one Redis script, so concurrent requests
    /// for one phone cannot pass the cap together.
    #[instrument(skip(self), fields(phone = %mask_phone(phone)))]
    pub async fn issue(&self, phone: &str) -> Result<IssuedCode, OtpError> {
        let count = match self
            .redis_pool
            .incr_below_cap(
                &attempts_key(phone),
                self.config.max_attempts,
                self.config.attempts_window_seconds,
            )
            .await?
        {
            CapCheck::Counted(count) => count,
            CapCheck::Refused(ttl) => {
                let retry_after_seconds = ttl.unwrap_or(self.config.attempts_window_seconds);
                warn!(retry_after_seconds, "OTP issuance rate limited");
                return Err(OtpError::RateLimited {
                    retry_after_seconds,
                });
            },
        };

        let code = if self.debug {
            self.config.debug_code.clone()
        } else {
            generate_code()
        };

        let record = StoredCode {
            code: code.clone(),
            issued_at: Utc::now().timestamp(),
        };
        let serialized =
            serde_json::to_string(&record).map_err(|e| OtpError::RedisError(e.to_string()))?;

        self.redis_pool
            .set_with_expiry(&code_key(phone), serialized, self.config.expire_minutes * 60)
            .await?;

        info!(attempt = count, "Stored verification code");
        Ok(IssuedCode {
            code,
            ttl_minutes: self.config.expire_minutes,
        })
    }

    /// Compare and consume the stored code in one step.
    /// On success the attempts counter is cleared and the phone is marked verified.
    #[instrument(skip(self, code), fields(phone = %mask_phone(phone)))]
    pub async fn verify(&self, phone: &str, code: &str) -> Result<(), OtpError> {
        let outcome = self
            .redis_pool
            .verify_code(
                &code_key(phone),
                &attempts_key(phone),
                &verified_key(phone),
                code,
                self.config.verified_ttl_seconds,
            )
            .await?;

        match outcome {
            CodeCheck::Matched => {
                info!("Verification code accepted");
                Ok(())
            },
            CodeCheck::Missing | CodeCheck::Mismatch => Err(OtpError::InvalidCode),
        }
    }

    /// Consume the verified marker; true when the phone had passed verification
    #[instrument(skip(self), fields(phone = %mask_phone(phone)))]
    pub async fn consume_verified(&self, phone: &str) -> Result<bool, OtpError> {
        Ok(self.redis_pool.take(&verified_key(phone)).await?)
    }

    /// Put the verified marker back after a registration attempt that did not commit
    pub async fn restore_verified(&self, phone: &str) -> Result<(), OtpError> {
        self.redis_pool
            .set_with_expiry(
                &verified_key(phone),
                "1".to_string(),
                self.config.verified_ttl_seconds,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert!(is_well_formed(&code), "bad code {}", code);
        }
    }

    #[test]
    fn test_well_formed() {
        assert!(is_well_formed("012345"));
        assert!(!is_well_formed("12345"));
        assert!(!is_well_formed("12a456"));
        assert!(!is_well_formed("1234567"));
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(code_key("901234567"), "otp:901234567");
        assert_eq!(attempts_key("901234567"), "otp_attempts:901234567");
        assert_eq!(verified_key("901234567"), "otp_verified:901234567");
    }

    #[test]
    fn test_stored_code_json_shape() {
        let record = StoredCode {
            code: "123456".into(),
            issued_at: 1_700_000_000,
        };
        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(json["code"], "123456");
        assert_eq!(json["issued_at"], 1_700_000_000i64);
    }
}
