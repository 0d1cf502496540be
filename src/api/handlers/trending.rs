//! Trending feed

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::api::middleware::{ApiKey, MsTokenOverride};
use crate::api::server::AppState;
use crate::error::GatewayError;
use crate::models::{CountQuery, ItemsResponse};

/// GET /api/v1/trending/videos
pub async fn trending_videos(
    State(state): State<AppState>,
    _key: ApiKey,
    MsTokenOverride(ms_token): MsTokenOverride,
    Query(query): Query<CountQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let items = state
        .scraper
        .trending_videos(query.resolved(), ms_token)
        .await?;
    Ok(Json(ItemsResponse::new(items, None)))
}
