//! Hashtag (challenge) lookups

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::api::middleware::{ApiKey, MsTokenOverride};
use crate::api::server::AppState;
use crate::error::GatewayError;
use crate::models::{CountQuery, ItemResponse, ItemsResponse};

fn normalize_hashtag(raw: &str) -> Result<String, GatewayError> {
    let name = raw.trim().trim_start_matches('#');
    if name.is_empty() {
        return Err(GatewayError::InvalidRequest("Hashtag is required".to_string()));
    }
    Ok(name.to_string())
}

/// GET /api/v1/hashtag/:hashtag/info
pub async fn hashtag_info(
    State(state): State<AppState>,
    _key: ApiKey,
    MsTokenOverride(ms_token): MsTokenOverride,
    Path(hashtag): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let hashtag = normalize_hashtag(&hashtag)?;
    let info = state.scraper.hashtag_info(&hashtag, ms_token).await?;
    Ok(Json(ItemResponse::new(info)))
}

/// GET /api/v1/hashtag/:hashtag/videos
pub async fn hashtag_videos(
    State(state): State<AppState>,
    _key: ApiKey,
    MsTokenOverride(ms_token): MsTokenOverride,
    Path(hashtag): Path<String>,
    Query(query): Query<CountQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let hashtag = normalize_hashtag(&hashtag)?;
    let items = state
        .scraper
        .hashtag_videos(&hashtag, query.resolved(), ms_token)
        .await?;
    Ok(Json(ItemsResponse::new(items, Some(hashtag))))
}
