//! ClipGate - Entry Point
//!
//! Builds the token and proxy pools, starts the API server and the background
//! maintenance tasks, and shuts everything down on Ctrl+C / SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use clipgate::api::middleware::RateLimiter;
use clipgate::api::{ApiServer, AppState};
use clipgate::config::{LogConfig, ProxyConfig};
use clipgate::credential::{
    CredentialMaintenance, CredentialMaintenanceConfig, CredentialMaintenanceHandle,
    CredentialPool,
};
use clipgate::error::{GatewayError, Result};
use clipgate::proxy::{ProxyPool, RefreshPolicy, WebshareProvider};
use clipgate::rotation::create_algorithm;
use clipgate::services::{ScrapeService, WebSessionBackend};
use clipgate::session::LeaseCoordinator;
use clipgate::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;
    init_tracing(&config.log);

    info!(
        environment = config.environment.as_str(),
        "Starting ClipGate v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Token pool
    let credentials = Arc::new(CredentialPool::new(
        config.tokens.ms_tokens.iter().cloned(),
        config.tokens.strategy,
    ));
    if credentials.is_empty() {
        warn!("No MS tokens configured; scraping requests need an X-MS-Token header");
    } else {
        info!(
            "Loaded {} MS tokens (strategy: {})",
            credentials.len(),
            config.tokens.strategy.as_str()
        );
    }

    // Proxy pool, fetched lazily on first lease
    let proxies = build_proxy_pool(&config.proxy)?;

    let backend = Arc::new(
        WebSessionBackend::new(config.scraper.base_url.clone())
            .with_timeout(Duration::from_secs(config.scraper.request_timeout_secs.max(1)))
            .with_user_agent(config.scraper.user_agent.clone()),
    );
    let coordinator = LeaseCoordinator::new(credentials.clone(), proxies, backend);
    let scraper = Arc::new(ScrapeService::new(coordinator));

    let rate_limiter = RateLimiter::new(config.server.rate_limit_enabled);

    // Create shutdown channel
    let (shutdown_tx, _) = watch::channel(false);

    // Start credential maintenance
    let (maintenance_handle, maintenance_shutdown) = CredentialMaintenanceHandle::new();
    let maintenance = CredentialMaintenance::new(
        credentials.clone(),
        CredentialMaintenanceConfig {
            check_interval: config.tokens.evict_interval(),
            max_unhealthy_age: config.tokens.max_unhealthy_age(),
        },
    );
    let maintenance_task = tokio::spawn(async move {
        maintenance.run(maintenance_shutdown).await;
    });

    // Start rate limiter cleanup
    let cleanup_limiter = rate_limiter.clone();
    let cleanup_shutdown = shutdown_tx.subscribe();
    let cleanup_task = tokio::spawn(async move {
        cleanup_limiter
            .run_cleanup(Duration::from_secs(5 * 60), cleanup_shutdown)
            .await;
    });

    // Start API server
    let api_server = ApiServer::new(AppState::new(config.clone(), scraper, rate_limiter));
    let api_shutdown = shutdown_tx.subscribe();
    let api_task = tokio::spawn(async move {
        if let Err(e) = api_server.run(api_shutdown).await {
            error!("API server error: {}", e);
        }
    });

    info!("Server started on {}", config.server_addr());

    // Wait for shutdown signal
    shutdown_signal().await;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    maintenance_handle.shutdown();

    let _ = tokio::join!(api_task, maintenance_task, cleanup_task);

    info!("ClipGate stopped");
    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("clipgate={},tower_http=debug", log.level).into());
    let registry = tracing_subscriber::registry().with(filter);

    if log.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn build_proxy_pool(config: &ProxyConfig) -> Result<Option<Arc<ProxyPool>>> {
    if !config.enabled {
        info!("Proxying disabled");
        return Ok(None);
    }

    let api_key = config.webshare_api_key.clone().ok_or_else(|| {
        GatewayError::InvalidConfig("WEBSHARE_API_KEY is required when PROXY_ENABLED is true".into())
    })?;
    let provider = WebshareProvider::with_base_url(api_key, config.webshare_base_url.clone())
        .map_err(|e| GatewayError::Internal(format!("failed to build proxy client: {}", e)))?
        .with_cookie(config.webshare_cookie.clone());

    let refresh_policy = match config.refresh_interval() {
        Some(interval) => RefreshPolicy::Every(interval),
        None => RefreshPolicy::Never,
    };

    info!(
        "Proxying via {} ({} selection, refresh: {:?})",
        config.provider,
        config.algorithm.as_str(),
        refresh_policy
    );

    let pool = ProxyPool::new(Arc::new(provider), create_algorithm(config.algorithm))
        .with_fetch_timeout(config.fetch_timeout())
        .with_refresh_policy(refresh_policy);

    Ok(Some(Arc::new(pool)))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
