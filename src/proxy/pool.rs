//! Lazily-fetched proxy pool
//!
//! The provider is called on first use and the result is cached. Only the
//! fetch itself is serialized; readers of the cached list never wait on the
//! network.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, instrument};

use super::provider::{FetchError, ProxyProvider};
use crate::models::{ProxyEndpoint, ProxyStatus};
use crate::rotation::SelectionAlgorithm;

/// Default bound on a single provider fetch
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// When the cached proxy list is re-fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Fetch once for the life of the process
    #[default]
    Never,
    /// Re-fetch on use once the cache is older than the interval
    Every(Duration),
}

/// Proxy pool backed by a [`ProxyProvider`]
pub struct ProxyPool {
    provider: Arc<dyn ProxyProvider>,
    algorithm: Arc<dyn SelectionAlgorithm>,
    proxies: RwLock<Arc<Vec<ProxyEndpoint>>>,
    initialized: AtomicBool,
    fetched_at: RwLock<Option<Instant>>,
    /// Held for the duration of a provider call: one fetch in flight at most
    fetch_guard: tokio::sync::Mutex<()>,
    fetch_timeout: Duration,
    refresh_policy: RefreshPolicy,
}

impl ProxyPool {
    pub fn new(provider: Arc<dyn ProxyProvider>, algorithm: Arc<dyn SelectionAlgorithm>) -> Self {
        Self {
            provider,
            algorithm,
            proxies: RwLock::new(Arc::new(Vec::new())),
            initialized: AtomicBool::new(false),
            fetched_at: RwLock::new(None),
            fetch_guard: tokio::sync::Mutex::new(()),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            refresh_policy: RefreshPolicy::Never,
        }
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh_policy = policy;
        self
    }

    /// Whether the provider has been consulted at least once
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Fetch the proxy list if it has not been fetched yet
    ///
    /// Concurrent callers trigger a single provider call; the others wait for
    /// it and then see its result. Fetch failures are logged and leave an empty
    /// list, they are never returned.
    pub async fn ensure_initialized(&self) {
        if !self.needs_fetch() {
            return;
        }

        let _guard = self.fetch_guard.lock().await;
        // Another caller may have completed the fetch while we waited
        if !self.needs_fetch() {
            return;
        }

        self.fetch_and_store().await;
    }

    /// Force a re-fetch regardless of the refresh policy
    pub async fn refresh(&self) {
        let _guard = self.fetch_guard.lock().await;
        self.fetch_and_store().await;
    }

    /// Current cached endpoints
    pub fn list_proxies(&self) -> Arc<Vec<ProxyEndpoint>> {
        self.proxies.read().clone()
    }

    /// Select one endpoint with the configured algorithm
    pub fn select_proxy(&self) -> Option<ProxyEndpoint> {
        let proxies = self.list_proxies();
        self.algorithm.select(proxies.as_slice()).cloned()
    }

    /// Status snapshot for monitoring
    pub fn status(&self) -> ProxyStatus {
        ProxyStatus {
            enabled: true,
            provider: self.provider.name().to_string(),
            algorithm: self.algorithm.name().to_string(),
            proxy_count: self.list_proxies().len(),
        }
    }

    fn needs_fetch(&self) -> bool {
        if !self.is_initialized() {
            return true;
        }

        match self.refresh_policy {
            RefreshPolicy::Never => false,
            RefreshPolicy::Every(interval) => {
                let fetched_at = *self.fetched_at.read();
                fetched_at.map(|at| at.elapsed() >= interval).unwrap_or(true)
            }
        }
    }

    /// Call the provider and store the outcome; caller holds `fetch_guard`
    #[instrument(skip(self), fields(provider = self.provider.name()))]
    async fn fetch_and_store(&self) {
        let result = match timeout(self.fetch_timeout, self.provider.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                secs: self.fetch_timeout.as_secs(),
            }),
        };

        match result {
            Ok(fetched) => {
                let mut seen = HashSet::new();
                let unique: Vec<ProxyEndpoint> = fetched
                    .into_iter()
                    .filter(|p| seen.insert(p.clone()))
                    .collect();

                info!("Proxy pool loaded {} endpoints", unique.len());
                *self.proxies.write() = Arc::new(unique);
            }
            Err(e) if self.is_initialized() => {
                error!(error = %e, "Proxy refresh failed, keeping previous endpoints");
            }
            Err(e) => {
                error!(error = %e, "Proxy fetch failed, continuing without proxies");
                *self.proxies.write() = Arc::new(Vec::new());
            }
        }

        *self.fetched_at.write() = Some(Instant::now());
        self.initialized.store(true, Ordering::Release);
        debug!("Proxy pool initialized");
    }
}
