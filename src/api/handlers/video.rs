//! Video lookups, comments and downloads

use axum::extract::{Path, Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::api::middleware::{ApiKey, MsTokenOverride};
use crate::api::server::AppState;
use crate::error::GatewayError;
use crate::models::{CountQuery, DownloadQuery, ItemResponse, ItemsResponse, VideoUrlQuery};
use crate::services::extract_video_id;

fn video_id_from(input: &str) -> Result<String, GatewayError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "URL parameter cannot be empty".to_string(),
        ));
    }
    extract_video_id(input).ok_or_else(|| {
        GatewayError::InvalidRequest(format!("Could not extract a video id from {}", input))
    })
}

fn download_filename(video_id: &str, watermark: bool) -> String {
    if watermark {
        format!("tiktok_video_{}_watermarked.mp4", video_id)
    } else {
        format!("tiktok_video_{}.mp4", video_id)
    }
}

/// POST /api/v1/video/parse-url with `{"url": ...}`
///
/// Pure parsing, no platform call.
pub async fn parse_url(
    _key: ApiKey,
    Json(request): Json<VideoUrlQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let video_id = video_id_from(&request.url)?;
    Ok(Json(json!({
        "video_id": video_id,
        "original_url": request.url.trim(),
        "resolved_url": null,
    })))
}

/// GET /api/v1/video/by-url?url=
pub async fn video_by_url(
    State(state): State<AppState>,
    _key: ApiKey,
    MsTokenOverride(ms_token): MsTokenOverride,
    Query(query): Query<VideoUrlQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let video_id = video_id_from(&query.url)?;
    let info = state.scraper.video_info(&video_id, ms_token).await?;
    Ok(Json(ItemResponse::new(info)))
}

/// GET /api/v1/video/:video_id
pub async fn video_info(
    State(state): State<AppState>,
    _key: ApiKey,
    MsTokenOverride(ms_token): MsTokenOverride,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let video_id = video_id_from(&video_id)?;
    let info = state.scraper.video_info(&video_id, ms_token).await?;
    Ok(Json(ItemResponse::new(info)))
}

/// GET /api/v1/video/:video_id/comments
pub async fn video_comments(
    State(state): State<AppState>,
    _key: ApiKey,
    MsTokenOverride(ms_token): MsTokenOverride,
    Path(video_id): Path<String>,
    Query(query): Query<CountQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let video_id = video_id_from(&video_id)?;
    let comments = state
        .scraper
        .video_comments(&video_id, query.resolved(), ms_token)
        .await?;
    Ok(Json(ItemsResponse::new(comments, Some(video_id))))
}

/// GET /api/v1/video/download-info?url=&quality=&watermark=
pub async fn download_info(
    State(state): State<AppState>,
    _key: ApiKey,
    MsTokenOverride(ms_token): MsTokenOverride,
    Query(query): Query<DownloadQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let video_id = video_id_from(&query.url)?;
    let info = state
        .scraper
        .download_info(&video_id, query.quality, query.watermark, ms_token)
        .await?;

    let mut body = serde_json::to_value(&info)
        .map_err(|e| GatewayError::Internal(format!("failed to encode download info: {}", e)))?;
    body["original_url"] = json!(query.url.trim());
    Ok(Json(body))
}

/// GET /api/v1/video/download-stream?url=&quality=&watermark=
///
/// The file is fetched in full within the lease, then sent as an attachment.
pub async fn download_stream(
    State(state): State<AppState>,
    _key: ApiKey,
    MsTokenOverride(ms_token): MsTokenOverride,
    Query(query): Query<DownloadQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let video_id = video_id_from(&query.url)?;
    let bytes = state
        .scraper
        .video_bytes(&video_id, query.quality, query.watermark, ms_token)
        .await?;

    let disposition = format!(
        "attachment; filename={}",
        download_filename(&video_id, query.watermark)
    );
    Ok((
        [
            (CONTENT_TYPE, "video/mp4".to_string()),
            (CONTENT_DISPOSITION, disposition),
            (CACHE_CONTROL, "no-cache".to_string()),
        ],
        bytes,
    ))
}
