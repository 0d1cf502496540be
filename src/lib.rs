//! ClipGate - rotating-credential REST gateway
//!
//! A REST gateway in front of the short-video platform's web API.
//!
//! ## Features
//!
//! - MS token pool with consecutive-failure quarantine and stale-token eviction
//! - Lazily fetched upstream proxy pool (Webshare) with pluggable selection
//! - Session leases that bind one token and one proxy to each outbound call
//! - API key authentication and per-route rate limiting

pub mod api;
pub mod config;
pub mod credential;
pub mod error;
pub mod models;
pub mod proxy;
pub mod rotation;
pub mod services;
pub mod session;

pub use config::Config;
pub use error::{GatewayError, Result};
