use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::video::VideoQuality;

/// Default number of items requested from the platform
pub const DEFAULT_COUNT: u32 = 30;
/// Upper bound for the `count` query parameter
pub const MAX_COUNT: u32 = 100;

/// `?count=` query parameter shared by list endpoints
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CountQuery {
    pub count: Option<u32>,
}

impl CountQuery {
    /// Requested count clamped to `1..=MAX_COUNT`
    pub fn resolved(&self) -> u32 {
        self.count.unwrap_or(DEFAULT_COUNT).clamp(1, MAX_COUNT)
    }
}

/// Search query parameters
#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub count: Option<u32>,
}

impl SearchQuery {
    /// Requested count clamped to `1..=MAX_COUNT`
    pub fn resolved_count(&self) -> u32 {
        CountQuery { count: self.count }.resolved()
    }
}

/// Video lookup by URL or bare id
#[derive(Debug, Clone, Deserialize)]
pub struct VideoUrlQuery {
    pub url: String,
}

/// Envelope for list results
#[derive(Debug, Clone, Serialize)]
pub struct ItemsResponse {
    pub items: Vec<Value>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ItemsResponse {
    pub fn new(items: Vec<Value>, subject: Option<String>) -> Self {
        Self {
            count: items.len(),
            items,
            subject,
            timestamp: Utc::now(),
        }
    }
}

/// Envelope for single-object results
#[derive(Debug, Clone, Serialize)]
pub struct ItemResponse {
    pub item: Value,
    pub timestamp: DateTime<Utc>,
}

impl ItemResponse {
    pub fn new(item: Value) -> Self {
        Self {
            item,
            timestamp: Utc::now(),
        }
    }
}

/// `?url=&quality=&watermark=` parameters of the download endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadQuery {
    pub url: String,
    #[serde(default)]
    pub quality: VideoQuality,
    #[serde(default)]
    pub watermark: bool,
}

/// Result of the live upstream check run by `/health`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UpstreamHealth {
    pub healthy: bool,
    pub message: String,
    pub videos_fetched: usize,
}

impl UpstreamHealth {
    pub fn healthy(videos_fetched: usize) -> Self {
        Self {
            healthy: true,
            message: "upstream is operational".to_string(),
            videos_fetched,
        }
    }

    pub fn unhealthy(reason: &impl std::fmt::Display) -> Self {
        Self {
            healthy: false,
            message: format!("upstream check failed: {}", reason),
            videos_fetched: 0,
        }
    }

    pub fn status(&self) -> &'static str {
        if self.healthy {
            "healthy"
        } else {
            "unhealthy"
        }
    }
}

/// Service health summary
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}
