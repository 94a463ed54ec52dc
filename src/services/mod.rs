// Services module for the Wedy backend
// Business logic layer for the application

pub mod auth;
pub mod background_tasks;
pub mod jwt;
pub mod otp;
pub mod payment;
pub mod quota;
pub mod sms;

// Re-export commonly used services
pub use auth::{AuthService, IssuedCodeInfo, UserProfile, VerifyOutcome};
pub use background_tasks::initialize_background_tasks;
pub use jwt::{JwtConfig, JwtError, JwtService, TokenPair};
pub use otp::{OtpError, OtpService};
pub use payment::{PaymentError, PaymentService, ProviderRegistry};
pub use quota::{Feature, LimitType, QuotaAction, QuotaError, QuotaGuard, QuotaUsage};
pub use sms::{build_sms_sender, SmsError, SmsSender};
