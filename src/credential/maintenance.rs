//! Credential maintenance service
//!
//! Periodically evicts tokens that have stayed unhealthy for too long. The pool
//! itself never schedules eviction; this service is the scheduler.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument};

use super::CredentialPool;

/// Credential maintenance configuration
#[derive(Debug, Clone)]
pub struct CredentialMaintenanceConfig {
    /// How often to look for stale tokens
    pub check_interval: Duration,
    /// How long a token may stay unhealthy before it is removed
    pub max_unhealthy_age: chrono::Duration,
}

impl Default for CredentialMaintenanceConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(3600),
            max_unhealthy_age: chrono::Duration::hours(24),
        }
    }
}

/// Background eviction of stale unhealthy tokens
pub struct CredentialMaintenance {
    pool: Arc<CredentialPool>,
    config: CredentialMaintenanceConfig,
}

impl CredentialMaintenance {
    pub fn new(pool: Arc<CredentialPool>, config: CredentialMaintenanceConfig) -> Self {
        Self { pool, config }
    }

    /// Run the maintenance loop (call in a spawned task)
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting credential maintenance ({}s interval, {}h max unhealthy age)",
            self.config.check_interval.as_secs(),
            self.config.max_unhealthy_age.num_hours()
        );

        let mut ticker = interval(self.config.check_interval.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // Skip immediate tick

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once();
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Credential maintenance shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Perform one eviction pass, returning the number of tokens removed
    pub fn run_once(&self) -> usize {
        let evicted = self.pool.evict_stale_unhealthy(self.config.max_unhealthy_age);
        if evicted > 0 {
            info!(
                "Evicted {} unhealthy tokens. Remaining: {}",
                evicted,
                self.pool.len()
            );
        } else {
            debug!("No stale unhealthy tokens to evict");
        }
        evicted
    }
}

/// Handle for managing the maintenance service
pub struct CredentialMaintenanceHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl CredentialMaintenanceHandle {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { shutdown_tx: tx }, rx)
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Default for CredentialMaintenanceHandle {
    fn default() -> Self {
        Self::new().0
    }
}
