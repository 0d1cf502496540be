//! Credential pool with health tracking
//!
//! Every read-modify-write runs under a single mutex, so concurrent callers can
//! never receive the same round-robin slot or lose a failure increment. The lock
//! is never held across an await point.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::CredentialStrategy;
use crate::models::{mask_secret, Credential, CredentialDetail, CredentialStats, HealthRecord};
use crate::rotation::{Random, RoundRobin, SelectionAlgorithm};

/// Pool of MS tokens rotated across outbound calls
pub struct CredentialPool {
    credentials: Mutex<Vec<Credential>>,
    /// Rotation cursor over the healthy snapshot
    round_robin: RoundRobin,
    strategy: CredentialStrategy,
}

impl CredentialPool {
    /// Create a pool from the configured secrets
    ///
    /// Blank entries and duplicates are dropped; order is preserved.
    pub fn new<I, S>(secrets: I, strategy: CredentialStrategy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut credentials: Vec<Credential> = Vec::new();
        for secret in secrets {
            let secret = secret.into();
            let secret = secret.trim();
            if secret.is_empty() || credentials.iter().any(|c| c.secret == secret) {
                continue;
            }
            credentials.push(Credential::new(secret));
        }

        info!(
            tokens = credentials.len(),
            strategy = strategy.as_str(),
            "Credential pool initialized"
        );

        Self {
            credentials: Mutex::new(credentials),
            round_robin: RoundRobin::new(),
            strategy,
        }
    }

    /// Default selection strategy used by [`acquire`](Self::acquire)
    pub fn strategy(&self) -> CredentialStrategy {
        self.strategy
    }

    /// Add a secret to the pool
    ///
    /// Returns `false` if it was already present.
    pub fn add(&self, secret: &str) -> bool {
        let mut credentials = self.credentials.lock();
        if credentials.iter().any(|c| c.secret == secret) {
            return false;
        }

        credentials.push(Credential::new(secret));
        info!(
            "Added new token to pool. Total tokens: {}",
            credentials.len()
        );
        true
    }

    /// Remove a secret and its health record
    ///
    /// Returns `false` if it was not present.
    pub fn remove(&self, secret: &str) -> bool {
        let mut credentials = self.credentials.lock();
        let before = credentials.len();
        credentials.retain(|c| c.secret != secret);

        let removed = credentials.len() < before;
        if removed {
            info!(
                "Removed token from pool. Total tokens: {}",
                credentials.len()
            );
        }
        removed
    }

    /// All healthy secrets, in pool order
    pub fn list_healthy(&self) -> Vec<String> {
        self.credentials
            .lock()
            .iter()
            .filter(|c| c.health.is_healthy)
            .map(|c| c.secret.clone())
            .collect()
    }

    /// Number of secrets in the pool, healthy or not
    pub fn len(&self) -> usize {
        self.credentials.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Health record for a secret, if known
    pub fn health(&self, secret: &str) -> Option<HealthRecord> {
        self.credentials
            .lock()
            .iter()
            .find(|c| c.secret == secret)
            .map(|c| c.health.clone())
    }

    /// Pick a healthy secret with the pool's default strategy
    ///
    /// `None` means the pool is exhausted; that is a normal signal, not an error.
    pub fn acquire(&self) -> Option<String> {
        self.acquire_with(self.strategy)
    }

    /// Pick a healthy secret with an explicit strategy and stamp its last use
    pub fn acquire_with(&self, strategy: CredentialStrategy) -> Option<String> {
        let mut credentials = self.credentials.lock();

        let healthy: Vec<usize> = credentials
            .iter()
            .enumerate()
            .filter(|(_, c)| c.health.is_healthy)
            .map(|(idx, _)| idx)
            .collect();

        let picked = match strategy {
            CredentialStrategy::RoundRobin => {
                let algo: &dyn SelectionAlgorithm = &self.round_robin;
                algo.select(&healthy).copied()
            }
            CredentialStrategy::Random => {
                let algo: &dyn SelectionAlgorithm = &Random;
                algo.select(&healthy).copied()
            }
            CredentialStrategy::LeastUsed => healthy
                .iter()
                .copied()
                .min_by_key(|&idx| credentials[idx].health.last_used_at),
        };

        let Some(idx) = picked else {
            warn!(total = credentials.len(), "No healthy tokens available");
            return None;
        };

        let credential = &mut credentials[idx];
        credential.health.last_used_at = Some(Utc::now());
        debug!(token = %mask_secret(&credential.secret), "Token acquired");

        Some(credential.secret.clone())
    }

    /// Report a successful call: clears the failure streak and restores health
    ///
    /// No-op for unknown secrets.
    pub fn report_success(&self, secret: &str) {
        let mut credentials = self.credentials.lock();
        if let Some(credential) = credentials.iter_mut().find(|c| c.secret == secret) {
            credential.health.record_success();
            debug!(token = %mask_secret(secret), "Token marked as successful");
        }
    }

    /// Report a failed call
    ///
    /// Takes the secret out of rotation once its consecutive failures reach
    /// the breaker threshold. No-op for unknown secrets.
    pub fn report_failure(&self, secret: &str, reason: &str) {
        let mut credentials = self.credentials.lock();
        let Some(credential) = credentials.iter_mut().find(|c| c.secret == secret) else {
            return;
        };

        if credential.health.record_failure(Utc::now()) {
            warn!(
                token = %mask_secret(secret),
                consecutive_failures = credential.health.consecutive_failures,
                "Token marked as unhealthy due to consecutive failures"
            );
        }

        debug!(token = %mask_secret(secret), reason, "Token failure recorded");
    }

    /// Restore a fresh health record (operator action)
    ///
    /// Returns `false` for unknown secrets.
    pub fn reset_health(&self, secret: &str) -> bool {
        let mut credentials = self.credentials.lock();
        match credentials.iter_mut().find(|c| c.secret == secret) {
            Some(credential) => {
                credential.health = HealthRecord::default();
                info!(token = %mask_secret(secret), "Token health reset");
                true
            }
            None => false,
        }
    }

    /// Remove secrets that have been unhealthy for longer than `max_age`
    ///
    /// Age is measured from the last recorded failure. Returns the number of
    /// secrets removed.
    pub fn evict_stale_unhealthy(&self, max_age: Duration) -> usize {
        self.evict_unhealthy_before(Utc::now() - max_age)
    }

    /// Remove secrets that are unhealthy with a last failure before `cutoff`
    pub fn evict_unhealthy_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut credentials = self.credentials.lock();
        let before = credentials.len();

        credentials.retain(|c| {
            let stale = c.health.unhealthy_since_before(cutoff);
            if stale {
                info!(token = %mask_secret(&c.secret), "Removed unhealthy token");
            }
            !stale
        });

        before - credentials.len()
    }

    /// Read-only statistics snapshot for monitoring
    pub fn stats(&self) -> CredentialStats {
        let credentials = self.credentials.lock();

        let total = credentials.len();
        let healthy = credentials.iter().filter(|c| c.health.is_healthy).count();
        let health_percentage = if total > 0 {
            healthy as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        CredentialStats {
            total_credentials: total,
            healthy_credentials: healthy,
            unhealthy_credentials: total - healthy,
            health_percentage,
            details: credentials
                .iter()
                .map(|c| CredentialDetail {
                    credential: mask_secret(&c.secret),
                    health: c.health.clone(),
                })
                .collect(),
            timestamp: Utc::now(),
        }
    }
}
