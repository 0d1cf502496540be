//! Proxy pool status

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::api::middleware::ApiKey;
use crate::api::server::AppState;
use crate::error::GatewayError;

/// GET /api/v1/proxy/status
///
/// Initializes the pool on first call so the count reflects the provider.
pub async fn proxy_status(
    State(state): State<AppState>,
    _key: ApiKey,
) -> Result<impl IntoResponse, GatewayError> {
    let status = state.scraper.coordinator().proxy_status().await;
    Ok(Json(status))
}
