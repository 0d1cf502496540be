//! Upstream proxy management
//!
//! This module provides:
//! - The provider interface and the Webshare adapter
//! - A lazily-initialized, cached proxy pool with pluggable selection

pub mod pool;
pub mod provider;
pub mod webshare;

pub use pool::{ProxyPool, RefreshPolicy, DEFAULT_FETCH_TIMEOUT};
pub use provider::{FetchError, ProxyProvider};
pub use webshare::WebshareProvider;
