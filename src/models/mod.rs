pub mod auth;
pub mod catalogue;
pub mod featured;
pub mod merchant;
pub mod payment;
pub mod subscription;
pub mod tariff;
pub mod user;

// Re-export common types
pub use auth::*;
pub use featured::{FeatureType, FeaturedService, NewFeaturedService};
pub use merchant::{Merchant, NewMerchant};
pub use payment::{
    NewPayment, Payment, PaymentMethod, PaymentProviderUpdate, PaymentStatus, PaymentType,
};
pub use subscription::{MerchantSubscription, NewMerchantSubscription, SubscriptionStatus};
pub use tariff::TariffPlan;
pub use user::*;
