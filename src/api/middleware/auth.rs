//! API key authentication and per-request token override

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::{debug, warn};

use crate::api::server::AppState;
use crate::error::GatewayError;
use crate::models::mask_secret;

/// Header carrying the client API key
pub const API_KEY_HEADER: &str = "x-api-key";
/// Header carrying an optional caller-supplied MS token
pub const MS_TOKEN_HEADER: &str = "x-ms-token";

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Extractor for requests carrying a valid `X-API-Key`
#[derive(Debug, Clone)]
pub struct ApiKey(pub String);

#[axum::async_trait]
impl FromRequestParts<AppState> for ApiKey {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let key = header_value(parts, API_KEY_HEADER).ok_or(GatewayError::MissingApiKey)?;

        if !state.config.auth.api_keys.iter().any(|k| k == key) {
            warn!(api_key = %mask_secret(key), "Invalid API key attempted");
            return Err(GatewayError::InvalidApiKey);
        }

        debug!(api_key = %mask_secret(key), "Valid API key used");
        Ok(ApiKey(key.to_string()))
    }
}

/// Optional `X-MS-Token` override; `None` means use the pool
#[derive(Debug, Clone, Default)]
pub struct MsTokenOverride(pub Option<String>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for MsTokenOverride
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MsTokenOverride(
            header_value(parts, MS_TOKEN_HEADER).map(str::to_string),
        ))
    }
}
