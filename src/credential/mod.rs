//! Credential rotation
//!
//! Owns the MS token pool: health tracking with a consecutive-failure breaker
//! and strategy-based selection among the healthy tokens.

mod maintenance;
mod pool;

pub use maintenance::{CredentialMaintenance, CredentialMaintenanceConfig, CredentialMaintenanceHandle};
pub use pool::CredentialPool;

/// Strategy for picking a credential from the healthy set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialStrategy {
    #[default]
    RoundRobin,
    Random,
    /// Least recently used; never-used credentials come first
    LeastUsed,
}

impl CredentialStrategy {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "random" => Self::Random,
            "least_used" | "leastused" | "least-used" => Self::LeastUsed,
            _ => Self::RoundRobin,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoundRobin => "round_robin",
            Self::Random => "random",
            Self::LeastUsed => "least_used",
        }
    }
}
