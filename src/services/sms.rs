// SMS delivery port
// Eskiz gateway for production, a logging sender for development.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};

use crate::app_config::SmsConfig;
use crate::utils::{mask_phone, to_international};

#[derive(Error, Debug)]
pub enum SmsError {
    #[error("SMS provider authentication failed: {0}")]
    AuthFailed(String),

    #[error("SMS provider is still waiting: {0}")]
    Transient(String),

    #[error("SMS rejected: {0}")]
    Rejected(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl SmsError {
    /// Failures worth another attempt for notifications
    pub fn is_retryable(&self) -> bool {
        matches!(self, SmsError::Transient(_) | SmsError::Network(_))
    }
}

pub fn otp_message(code: &str) -> String {
    format!("Wedy verification code: {}. Do not share this code.", code)
}

#[async_trait]
pub trait SmsSender: Send + Sync {
    /// Deliver a one-time code; never retried
    async fn send_otp(&self, phone: &str, code: &str) -> Result<(), SmsError>;

    /// Deliver a free-form notification, retrying transient failures
    async fn send_notification(&self, phone: &str, text: &str) -> Result<(), SmsError>;
}

/// Development sender: writes the message to the log and reports success
#[derive(Debug, Default, Clone)]
pub struct LogSmsSender;

#[async_trait]
impl SmsSender for LogSmsSender {
    async fn send_otp(&self, phone: &str, code: &str) -> Result<(), SmsError> {
        info!(phone = %phone, code = %code, "OTP (not sent, debug mode)");
        Ok(())
    }

    async fn send_notification(&self, phone: &str, text: &str) -> Result<(), SmsError> {
        info!(phone = %phone, text = %text, "SMS (not sent, debug mode)");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    data: Option<LoginData>,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    status: Option<String>,
    message: Option<String>,
}

/// Outcome of interpreting an Eskiz send response body
fn classify_send_status(body: &SendResponse) -> Result<(), SmsError> {
    let status = body.status.as_deref().unwrap_or("").to_lowercase();
    let message = body.message.clone().unwrap_or_else(|| "Unknown error".to_string());

    match status.as_str() {
        "success" => Ok(()),
        "waiting" | "waiting for sms provider" => Err(SmsError::Transient(message)),
        _ if message.to_lowercase().contains("waiting for sms provider") => {
            Err(SmsError::Transient(message))
        },
        _ => Err(SmsError::Rejected(message)),
    }
}

/// Eskiz gateway client with a cached bearer token
#[derive(Clone)]
pub struct EskizSmsSender {
    client: Client,
    config: SmsConfig,
    token: Arc<RwLock<Option<String>>>,
}

impl EskizSmsSender {
    pub fn new(config: SmsConfig) -> Result<Self, SmsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| SmsError::Network(e.to_string()))?;

        Ok(Self {
            client,
            config,
            token: Arc::new(RwLock::new(None)),
        })
    }

    async fn login(&self) -> Result<String, SmsError> {
        let response = self
            .client
            .post(format!("{}/auth/login", self.config.base_url))
            .form(&[
                ("email", self.config.email.as_str()),
                ("password", self.config.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SmsError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SmsError::AuthFailed(format!("status {}", response.status())));
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| SmsError::AuthFailed(e.to_string()))?;

        body.data
            .and_then(|d| d.token)
            .ok_or_else(|| SmsError::AuthFailed("no token in response".to_string()))
    }

    async fn token(&self) -> Result<String, SmsError> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }

        let mut guard = self.token.write().await;
        if let Some(token) = guard.clone() {
            return Ok(token);
        }
        let token = self.login().await?;
        *guard = Some(token.clone());
        Ok(token)
    }

    async fn invalidate_token(&self) {
        *self.token.write().await = None;
    }

    async fn post_message(&self, token: &str, phone: &str, text: &str) -> Result<reqwest::Response, SmsError> {
        let mobile_phone = to_international(phone);
        self.client
            .post(format!("{}/message/sms/send", self.config.base_url))
            .bearer_auth(token)
            .form(&[
                ("mobile_phone", mobile_phone.as_str()),
                ("message", text),
                ("from", self.config.from.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SmsError::Network(e.to_string()))
    }

    /// One delivery attempt; a 401 refreshes the token and retries once
    #[instrument(skip(self, text), fields(phone = %mask_phone(phone)))]
    async fn deliver(&self, phone: &str, text: &str) -> Result<(), SmsError> {
        let token = self.token().await?;
        let mut response = self.post_message(&token, phone, text).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Eskiz token rejected, logging in again");
            self.invalidate_token().await;
            let token = self.token().await?;
            response = self.post_message(&token, phone, text).await?;
        }

        let status = response.status();
        if status.is_server_error() {
            return Err(SmsError::Network(format!("provider status {}", status)));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("Eskiz rejected message: {} {}", status, text);
            return Err(SmsError::Rejected(format!("status {}", status)));
        }

        let body: SendResponse = response
            .json()
            .await
            .map_err(|e| SmsError::Rejected(e.to_string()))?;
        classify_send_status(&body)?;

        info!("SMS delivered");
        Ok(())
    }
}

#[async_trait]
impl SmsSender for EskizSmsSender {
    async fn send_otp(&self, phone: &str, code: &str) -> Result<(), SmsError> {
        self.deliver(phone, &otp_message(code)).await
    }

    async fn send_notification(&self, phone: &str, text: &str) -> Result<(), SmsError> {
        let attempts = self.config.notification_retries.max(1);
        let delay = Duration::from_millis(self.config.retry_delay_ms);

        let mut attempt = 1;
        loop {
            match self.deliver(phone, text).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!("Notification attempt {} failed: {}", attempt, e);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
                Err(e) => return Err(e),
            }
        }
    }
}

/// Pick the sender for the current mode
pub fn build_sms_sender(config: &SmsConfig, debug: bool) -> Result<Arc<dyn SmsSender>, SmsError> {
    if debug {
        info!("Debug mode: SMS messages are logged, not sent");
        Ok(Arc::new(LogSmsSender))
    } else {
        Ok(Arc::new(EskizSmsSender::new(config.clone())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(status: &str, message: &str) -> SendResponse {
        SendResponse {
            status: Some(status.to_string()),
            message: Some(message.to_string()),
        }
    }

    #[test]
    fn test_otp_message_text() {
        assert_eq!(
            otp_message("123456"),
            "Wedy verification code: 123456. Do not share this code."
        );
    }

    #[test]
    fn test_classify_send_status() {
        assert!(classify_send_status(&body("success", "ok")).is_ok());
        assert!(matches!(
            classify_send_status(&body("waiting", "Waiting for SMS provider")),
            Err(SmsError::Transient(_))
        ));
        assert!(matches!(
            classify_send_status(&body("error", "Waiting for SMS provider")),
            Err(SmsError::Transient(_))
        ));
        assert!(matches!(
            classify_send_status(&body("error", "Invalid phone")),
            Err(SmsError::Rejected(_))
        ));
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(SmsError::Transient("w".into()).is_retryable());
        assert!(SmsError::Network("n".into()).is_retryable());
        assert!(!SmsError::Rejected("r".into()).is_retryable());
    }

    #[tokio::test]
    async fn test_log_sender_always_succeeds() {
        let sender = LogSmsSender;
        assert!(sender.send_otp("901234567", "123456").await.is_ok());
        assert!(sender.send_notification("901234567", "hi").await.is_ok());
    }
}
