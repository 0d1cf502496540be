//! Outbound session backend interface

use async_trait::async_trait;
use thiserror::Error;

use crate::models::ProxyEndpoint;

/// Error raised by a session backend while opening or closing a session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Creates and tears down the opaque outbound session a lease hands out
#[async_trait]
pub trait SessionBackend: Send + Sync + 'static {
    type Session: Send + Sync + 'static;

    /// Open a session bound to `credential` and, if given, routed via `proxy`
    async fn create(
        &self,
        credential: &str,
        proxy: Option<&ProxyEndpoint>,
    ) -> Result<Self::Session, BackendError>;

    /// Release everything the session holds
    async fn destroy(&self, session: &Self::Session) -> Result<(), BackendError>;
}
