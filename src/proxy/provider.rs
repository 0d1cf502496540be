//! Proxy provider interface

use async_trait::async_trait;
use thiserror::Error;

use crate::models::ProxyEndpoint;

/// Errors from fetching a proxy list
///
/// These never leave the proxy pool; the pool degrades to an empty list.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider returned status {status}")]
    Status { status: u16 },

    #[error("invalid provider response: {0}")]
    Decode(String),

    #[error("fetch timed out after {secs}s")]
    Timeout { secs: u64 },
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            FetchError::Status {
                status: status.as_u16(),
            }
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Source of upstream proxy endpoints
///
/// Additional vendors plug in by implementing this trait.
#[async_trait]
pub trait ProxyProvider: Send + Sync {
    /// Fetch the provider's current proxy list
    async fn fetch(&self) -> Result<Vec<ProxyEndpoint>, FetchError>;

    /// Provider name for status reporting
    fn name(&self) -> &'static str;
}
