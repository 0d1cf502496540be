//! API server using Axum

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::config::Config;
use crate::credential::CredentialPool;
use crate::error::{GatewayError, Result};
use crate::services::ScrapeService;

use super::middleware::{cors_layer, RateLimiter, RequestLogging};
use super::routes;

/// Shared state for API handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub scraper: Arc<ScrapeService>,
    pub rate_limiter: RateLimiter,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config, scraper: Arc<ScrapeService>, rate_limiter: RateLimiter) -> Self {
        Self {
            config,
            scraper,
            rate_limiter,
            started_at: Instant::now(),
        }
    }

    pub fn credentials(&self) -> &Arc<CredentialPool> {
        self.scraper.coordinator().credentials()
    }
}

/// Build the full application router with its layers
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(state.config.environment, &state.config.server.cors_origins);

    let router = routes::create_router(state)
        .layer(axum::middleware::from_fn(RequestLogging::log_request));
    let router = match cors {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.layer(TraceLayer::new_for_http())
}

/// API server
pub struct ApiServer {
    config: Config,
    state: AppState,
}

impl ApiServer {
    pub fn new(state: AppState) -> Self {
        Self {
            config: state.config.clone(),
            state,
        }
    }

    /// Run the API server until `shutdown` flips to true
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let addr: SocketAddr = self.config.server_addr().parse().map_err(|_| {
            GatewayError::InvalidConfig(format!(
                "Invalid server address {}",
                self.config.server_addr()
            ))
        })?;

        let router = build_router(self.state.clone());

        info!("API server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

        info!("API server shut down");
        Ok(())
    }
}
