// Passwordless authentication: SMS codes, registration and token refresh

use chrono::Utc;
use diesel_async::AsyncConnection;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::app_config::MerchantDefaults;
use crate::db::DieselPool;
use crate::models::subscription::DAYS_PER_MONTH;
use crate::models::{Merchant, NewMerchant, NewUser, TariffPlan, User, UserType};
use crate::services::jwt::{JwtService, TokenPair};
use crate::services::otp::{is_well_formed, OtpService};
use crate::services::payment::{fulfillment, PaymentError};
use crate::services::sms::SmsSender;
use crate::utils::{log_auth_failure, mask_phone, normalize_phone, AuthError};

/// Plan tried when the configured start tariff is missing
const FALLBACK_START_TARIFF: &str = "Basic";

const MAX_NAME_LENGTH: usize = 255;

#[derive(Debug, Clone, Serialize)]
pub struct IssuedCodeInfo {
    pub phone_normalized: String,
    pub ttl_minutes: u64,
}

/// Result of a code check: tokens for a known user, or a pending registration
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub is_new: bool,
    pub tokens: Option<TokenPair>,
}

/// Authenticated user with the merchant profile when one exists
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub user: User,
    pub merchant: Option<Merchant>,
}

/// Trimmed display name, 1..=255 characters
pub fn validate_name(name: &str) -> Result<String, AuthError> {
    let trimmed = name.trim();
    let length = trimmed.chars().count();
    if length == 0 || length > MAX_NAME_LENGTH {
        return Err(AuthError::ValidationError(format!(
            "Name must be between 1 and {} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(trimmed.to_string())
}

/// Only clients and merchants may self-register
pub fn registration_role(role: &str) -> Result<UserType, AuthError> {
    match UserType::from_string(role.trim()) {
        Ok(UserType::Admin) | Err(_) => Err(AuthError::ValidationError(
            "Role must be client or merchant".to_string(),
        )),
        Ok(role) => Ok(role),
    }
}

#[derive(Clone)]
pub struct AuthService {
    diesel_pool: DieselPool,
    otp: OtpService,
    sms: Arc<dyn SmsSender>,
    jwt: Arc<JwtService>,
    merchant_defaults: MerchantDefaults,
}

impl AuthService {
    pub fn new(
        diesel_pool: DieselPool,
        otp: OtpService,
        sms: Arc<dyn SmsSender>,
        jwt: Arc<JwtService>,
        merchant_defaults: MerchantDefaults,
    ) -> Self {
        Self {
            diesel_pool,
            otp,
            sms,
            jwt,
            merchant_defaults,
        }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    /// Store a fresh code and send it by SMS.
    /// A failed send keeps the stored code so an earlier delivery stays usable.
    #[instrument(skip(self))]
    pub async fn issue_code(&self, raw_phone: &str) -> Result<IssuedCodeInfo, AuthError> {
        let phone = normalize_phone(raw_phone)?;

        let issued = self.otp.issue(&phone).await.map_err(|e| {
            let err = AuthError::from(e);
            log_auth_failure(&phone, &err);
            err
        })?;

        if let Err(e) = self.sms.send_otp(&phone, &issued.code).await {
            error!(phone = %mask_phone(&phone), "OTP delivery failed: {}", e);
            return Err(e.into());
        }

        Ok(IssuedCodeInfo {
            phone_normalized: phone,
            ttl_minutes: issued.ttl_minutes,
        })
    }

    /// Check a code; known active users get tokens, unknown phones may register
    #[instrument(skip(self, code))]
    pub async fn verify_code(&self, raw_phone: &str, code: &str) -> Result<VerifyOutcome, AuthError> {
        let phone = normalize_phone(raw_phone)?;
        let code = code.trim();
        if !is_well_formed(code) {
            return Err(AuthError::InvalidCode);
        }

        if let Err(e) = self.otp.verify(&phone, code).await {
            let err = AuthError::from(e);
            log_auth_failure(&phone, &err);
            return Err(err);
        }

        let mut conn = self.diesel_pool.get().await?;
        let Some(user) = User::find_by_phone(&mut conn, &phone).await? else {
            info!(phone = %mask_phone(&phone), "Verified phone has no account yet");
            return Ok(VerifyOutcome {
                is_new: true,
                tokens: None,
            });
        };

        // The marker only serves registration; an existing account does not need it
        self.otp.consume_verified(&phone).await?;

        if !user.is_active {
            log_auth_failure(&phone, &AuthError::AccountInactive);
            return Err(AuthError::AccountInactive);
        }

        let tokens = self.jwt.issue_pair(&user.id.to_string())?;
        info!(user_id = %user.id, "User signed in");
        Ok(VerifyOutcome {
            is_new: false,
            tokens: Some(tokens),
        })
    }

    /// Create the account for a verified phone and sign it in
    #[instrument(skip(self, name))]
    pub async fn complete_registration(
        &self,
        raw_phone: &str,
        name: &str,
        role: &str,
    ) -> Result<TokenPair, AuthError> {
        let phone = normalize_phone(raw_phone)?;
        let role = registration_role(role)?;
        let name = validate_name(name)?;

        if !self.otp.consume_verified(&phone).await? {
            log_auth_failure(&phone, &AuthError::InvalidCode);
            return Err(AuthError::InvalidCode);
        }

        let result = self.create_account(&phone, &name, role).await;
        let (user, merchant) = match result {
            Ok(created) => created,
            Err(err) => {
                if !matches!(err, AuthError::Conflict(_)) {
                    if let Err(e) = self.otp.restore_verified(&phone).await {
                        warn!("Could not restore verified marker: {}", e);
                    }
                }
                log_auth_failure(&phone, &err);
                return Err(err);
            },
        };

        if let Some(merchant) = &merchant {
            if let Err(e) = self.activate_start_tariff(merchant.id).await {
                warn!(merchant_id = %merchant.id, "Start tariff activation failed: {}", e);
            }
        }

        info!(user_id = %user.id, role = role.as_str(), "User registered");
        Ok(self.jwt.issue_pair(&user.id.to_string())?)
    }

    async fn create_account(
        &self,
        phone: &str,
        name: &str,
        role: UserType,
    ) -> Result<(User, Option<Merchant>), AuthError> {
        let mut conn = self.diesel_pool.get().await?;

        let phone = phone.to_string();
        let name = name.to_string();
        let region = self.merchant_defaults.default_region.clone();

        conn.transaction::<_, AuthError, _>(|tx| {
            Box::pin(async move {
                if let Some(existing) = User::find_by_phone(tx, &phone).await? {
                    if existing.is_active {
                        return Err(AuthError::Conflict(
                            "Phone number already registered".to_string(),
                        ));
                    }
                }

                let user = User::create(
                    tx,
                    NewUser {
                        phone_number: phone,
                        name: name.clone(),
                        user_type: role.as_str().to_string(),
                        is_active: true,
                    },
                )
                .await?;

                let merchant = if role == UserType::Merchant {
                    Some(
                        Merchant::create(
                            tx,
                            NewMerchant {
                                user_id: user.id,
                                business_name: Some(name),
                                location_region: Some(region),
                            },
                        )
                        .await?,
                    )
                } else {
                    None
                };

                Ok((user, merchant))
            })
        })
        .await
    }

    /// Give a new merchant the start plan without a payment
    async fn activate_start_tariff(&self, merchant_id: Uuid) -> Result<(), PaymentError> {
        let mut conn = self.diesel_pool.get().await?;
        let preferred = self.merchant_defaults.start_tariff_name.clone();
        let days = i64::from(self.merchant_defaults.start_tariff_months) * DAYS_PER_MONTH;

        conn.transaction::<_, PaymentError, _>(|tx| {
            Box::pin(async move {
                let mut plan = TariffPlan::find_active_by_name(tx, &preferred).await?;
                if plan.is_none() {
                    plan = TariffPlan::find_active_by_name(tx, FALLBACK_START_TARIFF).await?;
                }
                if plan.is_none() {
                    plan = TariffPlan::cheapest_active(tx).await?;
                }
                let Some(plan) = plan else {
                    warn!("No active tariff plan to start merchants on");
                    return Ok(());
                };

                let grant = fulfillment::grant_subscription_days(
                    tx,
                    merchant_id,
                    &plan,
                    days,
                    None,
                    Utc::now().date_naive(),
                )
                .await?;
                info!(
                    %merchant_id,
                    plan = %plan.name,
                    end_date = %grant.subscription.end_date,
                    "Start tariff activated"
                );
                Ok(())
            })
        })
        .await
    }

    /// Exchange a refresh token for a new pair
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.jwt.validate_refresh_token(refresh_token.trim())?;
        let user = self.active_user(&claims.sub).await?;
        Ok(self.jwt.issue_pair(&user.id.to_string())?)
    }

    /// Resolve the subject of a valid access token to an active user
    pub async fn authenticate(&self, access_token: &str) -> Result<User, AuthError> {
        let claims = self.jwt.validate_access_token(access_token)?;
        self.active_user(&claims.sub).await
    }

    async fn active_user(&self, subject: &str) -> Result<User, AuthError> {
        let user_id = Uuid::parse_str(subject).map_err(|_| AuthError::InvalidToken)?;
        let mut conn = self.diesel_pool.get().await?;
        let user = User::find_by_id(&mut conn, user_id).await?;
        if !user.is_active {
            return Err(AuthError::InvalidToken);
        }
        Ok(user)
    }

    pub async fn profile(&self, user: User) -> Result<UserProfile, AuthError> {
        let mut conn = self.diesel_pool.get().await?;
        let merchant = if user.is_merchant() {
            Merchant::find_by_user_id(&mut conn, user.id).await?
        } else {
            None
        };
        Ok(UserProfile { user, merchant })
    }
}
