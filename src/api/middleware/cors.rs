//! CORS middleware configuration
//!
//! Development allows any origin. Elsewhere only the configured origins are
//! allowed, and no CORS layer is installed when none are configured.

use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::CorsLayer;
use tracing::debug;

use crate::config::Environment;

/// Build the CORS layer for `environment`, if any
pub fn cors_layer(environment: Environment, allowed_origins: &[String]) -> Option<CorsLayer> {
    if environment.is_development() {
        debug!("CORS: development mode, allowing all origins");
        return Some(CorsLayer::permissive());
    }

    if allowed_origins.is_empty() {
        debug!("CORS: no origins configured, layer disabled");
        return None;
    }

    debug!("CORS: Allowing origins: {:?}", allowed_origins);
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([
                header::CONTENT_TYPE,
                header::ACCEPT,
                HeaderName::from_static("x-api-key"),
                HeaderName::from_static("x-ms-token"),
            ]),
    )
}
