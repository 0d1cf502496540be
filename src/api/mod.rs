//! REST API
//!
//! Axum routes for the scraping endpoints plus service info, token statistics
//! and proxy status.

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;

pub use server::{build_router, ApiServer, AppState};
