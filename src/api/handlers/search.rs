//! Keyword search

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::api::middleware::{ApiKey, MsTokenOverride};
use crate::api::server::AppState;
use crate::error::GatewayError;
use crate::models::{ItemsResponse, SearchQuery};

fn keyword(query: &SearchQuery) -> Result<String, GatewayError> {
    let q = query.q.trim();
    if q.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "Search query must not be empty".to_string(),
        ));
    }
    Ok(q.to_string())
}

/// GET /api/v1/search/users?q=
pub async fn search_users(
    State(state): State<AppState>,
    _key: ApiKey,
    MsTokenOverride(ms_token): MsTokenOverride,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let q = keyword(&query)?;
    let items = state
        .scraper
        .search_users(&q, query.resolved_count(), ms_token)
        .await?;
    Ok(Json(ItemsResponse::new(items, Some(q))))
}

/// GET /api/v1/search/videos?q=
pub async fn search_videos(
    State(state): State<AppState>,
    _key: ApiKey,
    MsTokenOverride(ms_token): MsTokenOverride,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let q = keyword(&query)?;
    let items = state
        .scraper
        .search_videos(&q, query.resolved_count(), ms_token)
        .await?;
    Ok(Json(ItemsResponse::new(items, Some(q))))
}
