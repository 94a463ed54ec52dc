// Utility modules

pub mod auth_errors;
pub mod phone;
pub mod service_error;

pub use auth_errors::{log_auth_failure, AuthError, AuthErrorResponse};
pub use phone::{mask_phone, normalize_phone, to_international, PhoneError};
pub use service_error::ServiceError;
