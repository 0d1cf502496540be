//! HTTP session backend for the platform's web API
//!
//! Each lease gets its own `reqwest::Client` carrying the msToken cookie and,
//! when one was leased, the upstream proxy.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, REFERER};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::{GatewayError, Result};
use crate::models::ProxyEndpoint;
use crate::session::{BackendError, SessionBackend};

/// Default platform origin
pub const PLATFORM_BASE_URL: &str = "https://www.tiktok.com";

/// Browser user agent sent with every platform request
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const WEB_APP_ID: &str = "1988";

/// [`SessionBackend`] that opens plain HTTP sessions against the web API
pub struct WebSessionBackend {
    base_url: String,
    request_timeout: Duration,
    user_agent: String,
}

impl WebSessionBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for WebSessionBackend {
    fn default() -> Self {
        Self::new(PLATFORM_BASE_URL)
    }
}

#[async_trait]
impl SessionBackend for WebSessionBackend {
    type Session = WebSession;

    async fn create(
        &self,
        credential: &str,
        proxy: Option<&ProxyEndpoint>,
    ) -> std::result::Result<WebSession, BackendError> {
        let cookie = HeaderValue::from_str(&format!("msToken={}", credential))
            .map_err(|_| BackendError::new("credential is not a valid cookie value"))?;
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, cookie);

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(self.user_agent.as_str())
            .timeout(self.request_timeout);

        if let Some(proxy) = proxy {
            let proxy = proxy
                .to_reqwest()
                .map_err(|e| BackendError::new(format!("invalid proxy {}: {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| BackendError::new(format!("failed to build HTTP client: {}", e)))?;

        Ok(WebSession {
            client,
            base_url: self.base_url.clone(),
            credential: credential.to_string(),
        })
    }

    async fn destroy(&self, _session: &WebSession) -> std::result::Result<(), BackendError> {
        // Connections close when the last handle to the client drops
        debug!("Web session released");
        Ok(())
    }
}

/// One leased HTTP session
pub struct WebSession {
    client: reqwest::Client,
    base_url: String,
    credential: String,
}

impl WebSession {
    /// GET `path` and return the decoded JSON body
    ///
    /// Non-2xx statuses and bodies whose `statusCode` is non-zero are errors.
    #[instrument(skip(self, query))]
    pub async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(&[("aid", WEB_APP_ID), ("msToken", self.credential.as_str())])
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::UpstreamStatus {
                status: status.as_u16(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Upstream(format!("invalid JSON body: {}", e)))?;

        match body.get("statusCode").and_then(Value::as_i64) {
            None | Some(0) => Ok(body),
            Some(code) => {
                let msg = body
                    .get("statusMsg")
                    .and_then(Value::as_str)
                    .filter(|m| !m.is_empty())
                    .unwrap_or("no message");
                Err(GatewayError::UpstreamRejected(format!(
                    "statusCode {}: {}",
                    code, msg
                )))
            }
        }
    }

    /// Download an absolute media URL through this session
    ///
    /// The CDN checks the referer, so the platform origin is sent along.
    #[instrument(skip(self))]
    pub async fn get_bytes(&self, url: &str) -> Result<Bytes> {
        let response = self
            .client
            .get(url)
            .header(REFERER, format!("{}/", self.base_url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::UpstreamStatus {
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?)
    }
}
