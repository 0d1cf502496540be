//! Webshare proxy provider
//!
//! Lists proxies from the Webshare v2 API, one page at a time.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, COOKIE};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use super::provider::{FetchError, ProxyProvider};
use crate::models::ProxyEndpoint;

/// Default Webshare API base URL
pub const WEBSHARE_API_URL: &str = "https://proxy.webshare.io";

const LIST_PATH: &str = "/api/v2/proxy/list/";
const PAGE_SIZE: u32 = 100;
const MAX_PAGES: u32 = 10;

/// One page of the proxy listing
#[derive(Debug, Deserialize)]
struct ProxyListPage {
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    results: Vec<WebshareProxy>,
}

#[derive(Debug, Deserialize)]
struct WebshareProxy {
    proxy_address: String,
    port: u16,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    country_code: Option<String>,
}

impl From<WebshareProxy> for ProxyEndpoint {
    fn from(p: WebshareProxy) -> Self {
        ProxyEndpoint {
            host: p.proxy_address,
            port: p.port,
            username: p.username,
            password: p.password,
            country_code: p.country_code,
        }
    }
}

/// Webshare proxy list client
pub struct WebshareProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    cookie: Option<String>,
}

impl WebshareProvider {
    /// Create a provider against the public Webshare API
    pub fn new(api_key: impl Into<String>) -> Result<Self, FetchError> {
        Self::with_base_url(api_key, WEBSHARE_API_URL)
    }

    /// Create a provider against a custom base URL
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            cookie: None,
        })
    }

    /// Send a cookie header with every listing request
    pub fn with_cookie(mut self, cookie: Option<String>) -> Self {
        self.cookie = cookie.filter(|c| !c.is_empty());
        self
    }

    async fn fetch_page(&self, page: u32) -> Result<ProxyListPage, FetchError> {
        let mut request = self
            .client
            .get(format!("{}{}", self.base_url, LIST_PATH))
            .header(AUTHORIZATION, format!("Token {}", self.api_key))
            .query(&[
                ("mode", "direct".to_string()),
                ("page", page.to_string()),
                ("page_size", PAGE_SIZE.to_string()),
            ]);

        if let Some(cookie) = &self.cookie {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await?.error_for_status()?;
        Ok(response.json::<ProxyListPage>().await?)
    }
}

#[async_trait]
impl ProxyProvider for WebshareProvider {
    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<Vec<ProxyEndpoint>, FetchError> {
        let mut proxies = Vec::new();

        for page in 1..=MAX_PAGES {
            let listing = self.fetch_page(page).await.map_err(|e| {
                warn!(page, error = %e, "Failed to fetch proxies from Webshare");
                e
            })?;

            debug!(page, results = listing.results.len(), "Fetched Webshare page");
            proxies.extend(listing.results.into_iter().map(ProxyEndpoint::from));

            if listing.next.is_none() {
                break;
            }
            if page == MAX_PAGES {
                warn!("Webshare listing truncated after {} pages", MAX_PAGES);
            }
        }

        info!("Fetched {} proxies from Webshare", proxies.len());
        Ok(proxies)
    }

    fn name(&self) -> &'static str {
        "webshare"
    }
}
