use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Upstream HTTP proxy endpoint
///
/// Two endpoints are the same proxy when host, port and username match; the
/// password and country code do not take part in identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyEndpoint {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub country_code: Option<String>,
}

impl ProxyEndpoint {
    /// Create an endpoint without authentication
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
            country_code: None,
        }
    }

    /// Attach basic-auth credentials
    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Proxy server address without credentials
    pub fn server(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Build a reqwest proxy routing all schemes through this endpoint
    pub fn to_reqwest(&self) -> Result<reqwest::Proxy, reqwest::Error> {
        let proxy = reqwest::Proxy::all(self.server())?;
        Ok(match (&self.username, &self.password) {
            (Some(user), Some(pass)) => proxy.basic_auth(user, pass),
            _ => proxy,
        })
    }
}

impl PartialEq for ProxyEndpoint {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port && self.username == other.username
    }
}

impl Eq for ProxyEndpoint {}

impl Hash for ProxyEndpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.host.hash(state);
        self.port.hash(state);
        self.username.hash(state);
    }
}

impl std::fmt::Display for ProxyEndpoint {
    // Never print the password
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.username {
            Some(user) => write!(f, "http://{}@{}:{}", user, self.host, self.port),
            None => write!(f, "http://{}:{}", self.host, self.port),
        }
    }
}

/// Proxy pool status for monitoring
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProxyStatus {
    pub enabled: bool,
    pub provider: String,
    pub algorithm: String,
    pub proxy_count: usize,
}

impl ProxyStatus {
    /// Status reported when proxying is turned off
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            provider: "none".to_string(),
            algorithm: "none".to_string(),
            proxy_count: 0,
        }
    }
}
