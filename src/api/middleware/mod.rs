//! API middleware

mod auth;
mod cors;
mod logging;
mod rate_limit;

pub use auth::{ApiKey, MsTokenOverride, API_KEY_HEADER, MS_TOKEN_HEADER};
pub use cors::cors_layer;
pub use logging::RequestLogging;
pub use rate_limit::{enforce_rate_limit, ClientId, RateLimitScope, RateLimiter, RouteGroup};
