// Periodic maintenance sweeps
// Expires lapsed subscriptions and fails payments abandoned before checkout.

use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::app::AppState;
use crate::models::{MerchantSubscription, Payment};

const MIN_SWEEP_INTERVAL_SECONDS: u64 = 60;

/// Background task manager for subscription and payment housekeeping
pub struct BackgroundTaskManager {
    state: AppState,
}

impl BackgroundTaskManager {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Spawn every sweep on its own interval
    pub fn start_all_tasks(&self) -> Vec<JoinHandle<()>> {
        let sweeps = &self.state.config.sweeps;
        info!(
            subscription_interval = sweeps.subscription_interval_seconds,
            pending_interval = sweeps.pending_interval_seconds,
            "Starting background sweeps"
        );

        vec![
            self.spawn_subscription_sweep(sweeps.subscription_interval_seconds),
            self.spawn_pending_payment_sweep(sweeps.pending_interval_seconds),
        ]
    }

    fn spawn_subscription_sweep(&self, every_seconds: u64) -> JoinHandle<()> {
        let state = self.state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(every_seconds.max(MIN_SWEEP_INTERVAL_SECONDS)));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if let Err(e) = expire_subscriptions(&state).await {
                    error!("Subscription sweep failed: {}", e);
                }
            }
        })
    }

    fn spawn_pending_payment_sweep(&self, every_seconds: u64) -> JoinHandle<()> {
        let state = self.state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(every_seconds.max(MIN_SWEEP_INTERVAL_SECONDS)));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if let Err(e) = fail_stale_payments(&state).await {
                    error!("Pending payment sweep failed: {}", e);
                }
            }
        })
    }
}

/// Mark active subscriptions whose end date passed as expired
pub async fn expire_subscriptions(
    state: &AppState,
) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
    let mut conn = state.diesel_pool.get().await?;
    let expired = MerchantSubscription::expire_ended(&mut conn, Utc::now().date_naive()).await?;
    if expired > 0 {
        info!(expired, "Expired lapsed subscriptions");
    }
    Ok(expired)
}

/// Fail pending payments that never reached a provider transaction in time
pub async fn fail_stale_payments(
    state: &AppState,
) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
    let cutoff = Utc::now() - ChronoDuration::minutes(state.config.payment.pending_timeout_minutes);
    let mut conn = state.diesel_pool.get().await?;
    let failed = Payment::fail_stale(&mut conn, cutoff).await?;
    if failed > 0 {
        info!(failed, "Failed abandoned pending payments");
    }
    Ok(failed)
}

/// Initialize background tasks (call this in main.rs)
pub fn initialize_background_tasks(state: AppState) -> Vec<JoinHandle<()>> {
    BackgroundTaskManager::new(state).start_all_tasks()
}
