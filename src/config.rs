use crate::credential::CredentialStrategy;
use crate::error::{GatewayError, Result};
use crate::rotation::SelectionStrategy;
use crate::services::{DEFAULT_USER_AGENT, PLATFORM_BASE_URL};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Deployment environment
    pub environment: Environment,
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Client API keys
    pub auth: AuthConfig,
    /// MS token pool configuration
    pub tokens: TokenConfig,
    /// Upstream proxy configuration
    pub proxy: ProxyConfig,
    /// Platform client configuration
    pub scraper: ScraperConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Testing,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Testing => "testing",
        }
    }

    pub fn is_development(&self) -> bool {
        *self == Environment::Development
    }
}

impl FromStr for Environment {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "development" => Ok(Environment::Development),
            "production" => Ok(Environment::Production),
            "testing" => Ok(Environment::Testing),
            other => Err(GatewayError::InvalidConfig(format!(
                "ENVIRONMENT must be one of development, production, testing (got {})",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on (default: 8000)
    pub port: u16,
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,
    /// Allowed CORS origins outside development (comma-separated)
    pub cors_origins: Vec<String>,
    /// Enable per-client rate limiting
    pub rate_limit_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Accepted values for the X-API-Key header
    pub api_keys: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// MS tokens seeded into the pool
    pub ms_tokens: Vec<String>,
    /// Default selection strategy
    pub strategy: CredentialStrategy,
    /// Seconds between stale-token sweeps
    pub evict_interval_secs: u64,
    /// Hours a token may stay unhealthy before eviction
    pub max_unhealthy_hours: i64,
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Route scraping sessions through upstream proxies
    pub enabled: bool,
    /// Proxy vendor (only "webshare" is supported)
    pub provider: String,
    pub webshare_api_key: Option<String>,
    pub webshare_base_url: String,
    /// Extra cookie sent to the vendor API
    pub webshare_cookie: Option<String>,
    /// Proxy selection algorithm
    pub algorithm: SelectionStrategy,
    /// Re-fetch interval in seconds (0 = fetch once)
    pub refresh_secs: u64,
    /// Provider fetch timeout in seconds
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Platform origin
    pub base_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let environment: Environment = get_env_or("ENVIRONMENT", "development").parse()?;

        let proxy = ProxyConfig {
            enabled: parse_env("PROXY_ENABLED", "false")?,
            provider: get_env_or("PROXY_PROVIDER", "webshare").trim().to_lowercase(),
            webshare_api_key: get_env_opt("WEBSHARE_API_KEY"),
            webshare_base_url: parse_url("WEBSHARE_BASE_URL", crate::proxy::webshare::WEBSHARE_API_URL)?,
            webshare_cookie: get_env_opt("WEBSHARE_COOKIE"),
            algorithm: SelectionStrategy::from_str(&get_env_or("PROXY_ALGORITHM", "round_robin")),
            refresh_secs: parse_env("PROXY_REFRESH_SECS", "0")?,
            fetch_timeout_secs: parse_env("PROXY_FETCH_TIMEOUT_SECS", "30")?,
        };

        if proxy.enabled {
            if proxy.provider != "webshare" {
                return Err(GatewayError::InvalidConfig(format!(
                    "PROXY_PROVIDER {} is not supported",
                    proxy.provider
                )));
            }
            if proxy.webshare_api_key.is_none() {
                return Err(GatewayError::InvalidConfig(
                    "WEBSHARE_API_KEY is required when PROXY_ENABLED is true".into(),
                ));
            }
        }

        Ok(Config {
            environment,
            server: ServerConfig {
                port: get_env_or("PORT", "8000").parse().map_err(|_| {
                    GatewayError::InvalidConfig("PORT must be a valid port number".into())
                })?,
                host: get_env_or("HOST", "0.0.0.0"),
                cors_origins: split_list(&get_env_or("CORS_ORIGINS", "")),
                rate_limit_enabled: parse_env("RATE_LIMIT_ENABLED", "true")?,
            },
            auth: AuthConfig {
                api_keys: split_list(&get_env_or("API_KEYS", "default-api-key")),
            },
            tokens: TokenConfig {
                ms_tokens: split_list(&get_env_or("MS_TOKENS", "")),
                strategy: CredentialStrategy::from_str(&get_env_or("TOKEN_STRATEGY", "round_robin")),
                evict_interval_secs: parse_env("TOKEN_EVICT_INTERVAL_SECS", "3600")?,
                max_unhealthy_hours: parse_env("TOKEN_MAX_UNHEALTHY_HOURS", "24")?,
            },
            proxy,
            scraper: ScraperConfig {
                base_url: parse_url("SCRAPER_BASE_URL", PLATFORM_BASE_URL)?,
                request_timeout_secs: parse_env("SCRAPER_TIMEOUT_SECS", "30")?,
                user_agent: get_env_or("SCRAPER_USER_AGENT", DEFAULT_USER_AGENT),
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "pretty"),
            },
        })
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl TokenConfig {
    pub fn evict_interval(&self) -> Duration {
        Duration::from_secs(self.evict_interval_secs)
    }

    pub fn max_unhealthy_age(&self) -> chrono::Duration {
        chrono::Duration::hours(self.max_unhealthy_hours)
    }
}

impl ProxyConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// `None` when the cache should never be re-fetched
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_secs > 0).then(|| Duration::from_secs(self.refresh_secs))
    }
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get a non-empty environment variable
fn get_env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T: FromStr>(key: &str, default: &str) -> Result<T> {
    get_env_or(key, default)
        .trim()
        .to_lowercase()
        .parse()
        .map_err(|_| GatewayError::InvalidConfig(format!("{} has an invalid value", key)))
}

fn parse_url(key: &str, default: &str) -> Result<String> {
    let raw = get_env_or(key, default);
    Url::parse(raw.trim()).map_err(|e| {
        GatewayError::InvalidConfig(format!("{} must be a valid URL: {}", key, e))
    })?;
    Ok(raw.trim().trim_end_matches('/').to_string())
}

/// Split a comma-separated list, dropping blanks
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
