//! Per-client rate limiting for the REST API
//!
//! Uses the governor crate. Each route group has its own per-minute quota and
//! clients are keyed by the full API key, falling back to the remote address.
//! Keys only appear masked in logs and error bodies.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use dashmap::DashMap;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovRateLimiter};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::auth::API_KEY_HEADER;
use crate::error::{GatewayError, Result};
use crate::models::mask_secret;

type DirectLimiter = GovRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Route groups with independent quotas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteGroup {
    Trending,
    User,
    Video,
    Hashtag,
    Search,
    Sound,
    Proxy,
    Health,
}

impl RouteGroup {
    /// Allowed requests per minute per client
    pub fn per_minute(&self) -> u32 {
        match self {
            RouteGroup::Trending => 200,
            RouteGroup::User => 100,
            RouteGroup::Video => 150,
            RouteGroup::Hashtag => 100,
            RouteGroup::Search => 50,
            RouteGroup::Sound => 100,
            RouteGroup::Proxy => 60,
            RouteGroup::Health => 1000,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteGroup::Trending => "trending",
            RouteGroup::User => "user",
            RouteGroup::Video => "video",
            RouteGroup::Hashtag => "hashtag",
            RouteGroup::Search => "search",
            RouteGroup::Sound => "sound",
            RouteGroup::Proxy => "proxy",
            RouteGroup::Health => "health",
        }
    }
}

/// Who a request is billed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId {
    /// Bucket key; carries the complete API key
    key: String,
    /// Printable form with the API key masked
    label: String,
}

impl ClientId {
    pub fn api_key(api_key: &str) -> Self {
        Self {
            key: format!("api_key:{}", api_key),
            label: format!("api_key:{}", mask_secret(api_key)),
        }
    }

    pub fn ip(ip: impl std::fmt::Display) -> Self {
        let key = format!("ip:{}", ip);
        Self {
            label: key.clone(),
            key,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

#[derive(Debug)]
struct ClientLimiter {
    limiter: Arc<DirectLimiter>,
    last_seen_ms: AtomicU64,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Rate limiter shared by all route groups
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    /// Limiters keyed by `group:client`
    limiters: Arc<DashMap<String, ClientLimiter>>,
    /// How long to keep per-client state without activity
    max_idle: Duration,
}

impl RateLimiter {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            limiters: Arc::new(DashMap::new()),
            max_idle: Duration::from_secs(10 * 60),
        }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Check if a request from `client` to `group` is allowed
    pub fn check(&self, group: RouteGroup, client: &ClientId) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let limiter = self.get_or_create_limiter(group, &client.key);
        match limiter.check() {
            Ok(_) => Ok(()),
            Err(_) => {
                warn!(group = group.as_str(), client = client.label(), "Rate limit exceeded");
                Err(GatewayError::RateLimitExceeded {
                    client: client.label.clone(),
                })
            }
        }
    }

    fn get_or_create_limiter(&self, group: RouteGroup, client: &str) -> Arc<DirectLimiter> {
        let now_ms = now_ms();
        let key = format!("{}:{}", group.as_str(), client);
        let entry = self.limiters.entry(key).or_insert_with(|| {
            let per_minute = NonZeroU32::new(group.per_minute()).unwrap_or(NonZeroU32::MIN);
            ClientLimiter {
                limiter: Arc::new(GovRateLimiter::direct(Quota::per_minute(per_minute))),
                last_seen_ms: AtomicU64::new(now_ms),
            }
        });

        entry.last_seen_ms.store(now_ms, Ordering::Relaxed);
        entry.limiter.clone()
    }

    /// Drop state for clients idle longer than `max_idle`
    pub fn cleanup(&self) {
        let now_ms = now_ms();
        let max_idle_ms = self.max_idle.as_millis() as u64;

        self.limiters.retain(|_, entry| {
            let last_seen = entry.last_seen_ms.load(Ordering::Relaxed);
            now_ms.saturating_sub(last_seen) <= max_idle_ms
        });
    }

    /// Number of tracked `group:client` pairs
    pub fn client_count(&self) -> usize {
        self.limiters.len()
    }

    /// Periodically run [`cleanup`](Self::cleanup) until shutdown
    pub async fn run_cleanup(&self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        if !self.enabled {
            return;
        }

        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.cleanup();
                    debug!("Rate limiter tracking {} clients", self.client_count());
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Rate limiter cleanup shutting down");
                        break;
                    }
                }
            }
        }
    }
}

/// Middleware state: the shared limiter plus the group it guards
#[derive(Clone)]
pub struct RateLimitScope {
    pub limiter: RateLimiter,
    pub group: RouteGroup,
}

fn header<'a>(req: &'a Request<Body>, name: &str) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Identify the caller: API key first, then forwarded or peer address
fn client_id(req: &Request<Body>) -> ClientId {
    if let Some(key) = header(req, API_KEY_HEADER) {
        return ClientId::api_key(key);
    }

    if let Some(ip) = header(req, "x-forwarded-for").and_then(|v| v.split(',').next()) {
        return ClientId::ip(ip.trim());
    }

    match req.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => ClientId::ip(addr.ip()),
        None => ClientId::ip("unknown"),
    }
}

/// Reject the request with 429 once the client's quota is spent
pub async fn enforce_rate_limit(
    State(scope): State<RateLimitScope>,
    req: Request<Body>,
    next: Next,
) -> std::result::Result<Response, GatewayError> {
    scope.limiter.check(scope.group, &client_id(&req))?;
    Ok(next.run(req).await)
}
