use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::session::{BackendError, LeaseError};

/// Unified error type for the ClipGate gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    // Resource rotation errors
    #[error("No healthy MS tokens available")]
    CredentialsExhausted,

    #[error("Failed to open scraping session: {0}")]
    SessionCreate(#[source] BackendError),

    // Upstream errors
    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Upstream returned status {status}")]
    UpstreamStatus { status: u16 },

    #[error("Upstream rejected request: {0}")]
    UpstreamRejected(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // Authentication errors
    #[error("API key required. Please provide X-API-Key header.")]
    MissingApiKey,

    #[error("Invalid API key. Access denied.")]
    InvalidApiKey,

    // Rate limiting
    #[error("Rate limit exceeded for {client}")]
    RateLimitExceeded { client: String },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Operation timed out")]
    Timeout,

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            GatewayError::InvalidRequest(_) | GatewayError::InvalidConfig(_) => {
                StatusCode::BAD_REQUEST
            }

            // 401 Unauthorized
            GatewayError::MissingApiKey => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            GatewayError::InvalidApiKey => StatusCode::FORBIDDEN,

            // 404 Not Found
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,

            // 429 Too Many Requests
            GatewayError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 502 Bad Gateway
            GatewayError::Upstream(_)
            | GatewayError::UpstreamStatus { .. }
            | GatewayError::UpstreamRejected(_)
            | GatewayError::SessionCreate(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            GatewayError::CredentialsExhausted => StatusCode::SERVICE_UNAVAILABLE,

            // 504 Gateway Timeout
            GatewayError::Timeout => StatusCode::GATEWAY_TIMEOUT,

            // 500 Internal Server Error
            GatewayError::Io(_) | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Short error title used in response bodies
    fn title(&self) -> &'static str {
        match self.status_code() {
            StatusCode::BAD_REQUEST => "Bad Request",
            StatusCode::UNAUTHORIZED => "Unauthorized",
            StatusCode::FORBIDDEN => "Forbidden",
            StatusCode::NOT_FOUND => "Not Found",
            StatusCode::TOO_MANY_REQUESTS => "Rate Limit Exceeded",
            StatusCode::BAD_GATEWAY => "Bad Gateway",
            StatusCode::SERVICE_UNAVAILABLE => "Service Unavailable",
            StatusCode::GATEWAY_TIMEOUT => "Gateway Timeout",
            _ => "Internal Server Error",
        }
    }
}

// Implement IntoResponse for API error responses
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = match &self {
            // Internal details stay in the logs
            GatewayError::Io(_) | GatewayError::Internal(_) => {
                tracing::error!(error = %self, "Internal error while handling request");
                "An unexpected error occurred".to_string()
            }
            _ => self.to_string(),
        };
        let body = json!({
            "error": self.title(),
            "detail": detail,
            "status_code": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}

impl From<LeaseError> for GatewayError {
    fn from(err: LeaseError) -> Self {
        match err {
            LeaseError::CredentialsExhausted => GatewayError::CredentialsExhausted,
            LeaseError::SessionCreate(e) => GatewayError::SessionCreate(e),
        }
    }
}

// Convert from outbound HTTP errors
impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else if let Some(status) = err.status() {
            GatewayError::UpstreamStatus {
                status: status.as_u16(),
            }
        } else {
            GatewayError::Upstream(err.to_string())
        }
    }
}
