//! User profile and posts

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::api::middleware::{ApiKey, MsTokenOverride};
use crate::api::server::AppState;
use crate::error::GatewayError;
use crate::models::{CountQuery, ItemResponse, ItemsResponse};

/// Usernames are accepted with or without the leading `@`
fn normalize_username(raw: &str) -> Result<String, GatewayError> {
    let username = raw.trim().trim_start_matches('@');
    if username.is_empty() {
        return Err(GatewayError::InvalidRequest("Username is required".to_string()));
    }
    Ok(username.to_string())
}

/// GET /api/v1/user/:username/info
pub async fn user_info(
    State(state): State<AppState>,
    _key: ApiKey,
    MsTokenOverride(ms_token): MsTokenOverride,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let username = normalize_username(&username)?;
    let info = state.scraper.user_info(&username, ms_token).await?;
    Ok(Json(ItemResponse::new(info)))
}

/// GET /api/v1/user/:username/videos
pub async fn user_videos(
    State(state): State<AppState>,
    _key: ApiKey,
    MsTokenOverride(ms_token): MsTokenOverride,
    Path(username): Path<String>,
    Query(query): Query<CountQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let username = normalize_username(&username)?;
    let items = state
        .scraper
        .user_videos(&username, query.resolved(), ms_token)
        .await?;
    Ok(Json(ItemsResponse::new(items, Some(username))))
}

/// GET /api/v1/user/:username/followers
pub async fn user_followers(
    State(state): State<AppState>,
    _key: ApiKey,
    MsTokenOverride(ms_token): MsTokenOverride,
    Path(username): Path<String>,
    Query(query): Query<CountQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let username = normalize_username(&username)?;
    let items = state
        .scraper
        .user_followers(&username, query.resolved(), ms_token)
        .await?;
    Ok(Json(ItemsResponse::new(items, Some(username))))
}

/// GET /api/v1/user/:username/following
pub async fn user_following(
    State(state): State<AppState>,
    _key: ApiKey,
    MsTokenOverride(ms_token): MsTokenOverride,
    Path(username): Path<String>,
    Query(query): Query<CountQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let username = normalize_username(&username)?;
    let items = state
        .scraper
        .user_following(&username, query.resolved(), ms_token)
        .await?;
    Ok(Json(ItemsResponse::new(items, Some(username))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_username() {
        assert_eq!(normalize_username("@someone").unwrap(), "someone");
        assert_eq!(normalize_username(" someone ").unwrap(), "someone");
        assert!(normalize_username("@").is_err());
    }
}
