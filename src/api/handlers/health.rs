//! Service info, health and token statistics

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde_json::json;

use crate::api::server::AppState;
use crate::models::HealthResponse;

/// API root: service information and endpoint map
pub async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "message": "ClipGate API",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment.as_str(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "endpoints": {
            "trending": "/api/v1/trending",
            "user": "/api/v1/user",
            "video": "/api/v1/video",
            "hashtag": "/api/v1/hashtag",
            "search": "/api/v1/search",
            "sound": "/api/v1/sound",
            "proxy": "/api/v1/proxy/status",
            "health": "/health",
            "token_stats": "/token-stats"
        }
    }))
}

/// Health check: a live upstream call with a pooled token decides the status
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let upstream = state.scraper.check_upstream().await;
    let stats = state.credentials().stats();
    let status = upstream.status();

    Json(HealthResponse {
        status: status.to_string(),
        message: format!(
            "API is {}. Upstream: {} ({}). Token health: {:.1}% ({}/{} healthy)",
            status,
            upstream.status(),
            upstream.message,
            stats.health_percentage,
            stats.healthy_credentials,
            stats.total_credentials
        ),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

/// Token pool statistics with masked tokens
pub async fn token_stats(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.credentials().stats();
    let timestamp = stats.timestamp;

    Json(json!({
        "token_stats": stats,
        "timestamp": timestamp,
    }))
}
