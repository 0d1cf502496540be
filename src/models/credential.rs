use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Consecutive failures after which a credential is taken out of rotation
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Per-credential health state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub is_healthy: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    /// Lifetime failure count, never decremented
    pub failure_count: u64,
    pub consecutive_failures: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
}

impl Default for HealthRecord {
    fn default() -> Self {
        Self {
            is_healthy: true,
            last_used_at: None,
            failure_count: 0,
            consecutive_failures: 0,
            last_failure_at: None,
        }
    }
}

impl HealthRecord {
    /// Record a successful call: clears the failure streak
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.is_healthy = true;
    }

    /// Record a failed call at `now`
    ///
    /// Returns `true` when this failure tripped the breaker.
    pub fn record_failure(&mut self, now: DateTime<Utc>) -> bool {
        let was_healthy = self.is_healthy;

        self.failure_count += 1;
        self.consecutive_failures += 1;
        self.last_failure_at = Some(now);

        if self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
            self.is_healthy = false;
        }

        was_healthy && !self.is_healthy
    }

    /// Whether the credential has been unhealthy since before `cutoff`
    pub fn unhealthy_since_before(&self, cutoff: DateTime<Utc>) -> bool {
        !self.is_healthy && self.last_failure_at.map(|t| t < cutoff).unwrap_or(false)
    }
}

/// A secret together with its health record
#[derive(Debug, Clone)]
pub struct Credential {
    pub secret: String,
    pub health: HealthRecord,
}

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            health: HealthRecord::default(),
        }
    }
}

/// Health detail for one credential, with the secret masked
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialDetail {
    pub credential: String,
    #[serde(flatten)]
    pub health: HealthRecord,
}

/// Aggregate credential pool statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialStats {
    pub total_credentials: usize,
    pub healthy_credentials: usize,
    pub unhealthy_credentials: usize,
    pub health_percentage: f64,
    pub details: Vec<CredentialDetail>,
    pub timestamp: DateTime<Utc>,
}

/// Mask a secret for logs and responses: first 10 characters followed by "..."
pub fn mask_secret(secret: &str) -> String {
    let prefix: String = secret.chars().take(10).collect();
    format!("{}...", prefix)
}
