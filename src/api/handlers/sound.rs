//! Sound (music) lookups

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::api::middleware::{ApiKey, MsTokenOverride};
use crate::api::server::AppState;
use crate::error::GatewayError;
use crate::models::{CountQuery, ItemResponse, ItemsResponse};

/// GET /api/v1/sound/:sound_id/info
pub async fn sound_info(
    State(state): State<AppState>,
    _key: ApiKey,
    MsTokenOverride(ms_token): MsTokenOverride,
    Path(sound_id): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let info = state.scraper.sound_info(sound_id.trim(), ms_token).await?;
    Ok(Json(ItemResponse::new(info)))
}

/// GET /api/v1/sound/:sound_id/videos
pub async fn sound_videos(
    State(state): State<AppState>,
    _key: ApiKey,
    MsTokenOverride(ms_token): MsTokenOverride,
    Path(sound_id): Path<String>,
    Query(query): Query<CountQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let sound_id = sound_id.trim().to_string();
    let items = state
        .scraper
        .sound_videos(&sound_id, query.resolved(), ms_token)
        .await?;
    Ok(Json(ItemsResponse::new(items, Some(sound_id))))
}
