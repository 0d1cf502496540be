//! Lease coordinator
//!
//! Per call: `NotStarted -> CredentialAcquired -> SessionCreated -> BodyExecuted
//! -> Success | Failure -> CleanedUp`. Exhaustion ends the call before any
//! proxy lookup or session creation.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::backend::{BackendError, SessionBackend};
use crate::credential::CredentialPool;
use crate::models::{mask_secret, ProxyEndpoint, ProxyStatus};
use crate::proxy::ProxyPool;

/// Failure reason recorded when a lease future is dropped before finishing
const CANCELLED_REASON: &str = "lease cancelled";

/// Errors raised by the coordinator itself
///
/// Errors from the lease body never take this form; they are returned as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LeaseError {
    #[error("no healthy credentials available")]
    CredentialsExhausted,

    #[error("failed to create outbound session: {0}")]
    SessionCreate(#[source] BackendError),
}

/// Resources bound to one outbound operation
pub struct Lease<S> {
    pub credential: String,
    pub proxy: Option<ProxyEndpoint>,
    pub session: Arc<S>,
}

/// Hands out credential + proxy + session leases
pub struct LeaseCoordinator<B: SessionBackend> {
    credentials: Arc<CredentialPool>,
    proxies: Option<Arc<ProxyPool>>,
    backend: Arc<B>,
}

impl<B: SessionBackend> LeaseCoordinator<B> {
    /// `proxies` of `None` disables proxying entirely
    pub fn new(
        credentials: Arc<CredentialPool>,
        proxies: Option<Arc<ProxyPool>>,
        backend: Arc<B>,
    ) -> Self {
        Self {
            credentials,
            proxies,
            backend,
        }
    }

    pub fn credentials(&self) -> &Arc<CredentialPool> {
        &self.credentials
    }

    pub fn proxies(&self) -> Option<&Arc<ProxyPool>> {
        self.proxies.as_ref()
    }

    /// Proxy status, initializing the pool first so the count is accurate
    pub async fn proxy_status(&self) -> ProxyStatus {
        match &self.proxies {
            Some(pool) => {
                pool.ensure_initialized().await;
                pool.status()
            }
            None => ProxyStatus::disabled(),
        }
    }

    /// Run `body` with a pooled credential
    ///
    /// Success and failure are reported to the credential pool. An error from
    /// `body` is returned unchanged; the session is destroyed in all cases.
    pub async fn with_lease<T, E, F, Fut>(&self, body: F) -> Result<T, E>
    where
        F: FnOnce(Lease<B::Session>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LeaseError> + Display,
    {
        let credential = self
            .credentials
            .acquire()
            .ok_or(LeaseError::CredentialsExhausted)?;

        self.run(credential, Some(self.credentials.clone()), body)
            .await
    }

    /// Run `body` with a caller-supplied credential
    ///
    /// Same protocol as [`with_lease`](Self::with_lease) but the outcome is not
    /// recorded anywhere, since the credential is not part of the pool.
    pub async fn with_credential<T, E, F, Fut>(&self, credential: String, body: F) -> Result<T, E>
    where
        F: FnOnce(Lease<B::Session>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LeaseError> + Display,
    {
        self.run(credential, None, body).await
    }

    #[instrument(skip_all, fields(credential = %mask_secret(&credential)))]
    async fn run<T, E, F, Fut>(
        &self,
        credential: String,
        pool: Option<Arc<CredentialPool>>,
        body: F,
    ) -> Result<T, E>
    where
        F: FnOnce(Lease<B::Session>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LeaseError> + Display,
    {
        let mut guard = LeaseGuard::new(pool, credential.clone(), self.backend.clone());

        let proxy = self.select_proxy().await;
        match &proxy {
            Some(p) => debug!(proxy = %p, "Lease using proxy"),
            None => debug!("Lease using direct connection"),
        }

        let session = match self.backend.create(&credential, proxy.as_ref()).await {
            Ok(session) => Arc::new(session),
            Err(e) => {
                warn!(error = %e, "Failed to create outbound session");
                guard.settle(Err(&e));
                return Err(LeaseError::SessionCreate(e).into());
            }
        };
        guard.session = Some(session.clone());

        let result = body(Lease {
            credential,
            proxy,
            session,
        })
        .await;

        guard.settle(result.as_ref().map(|_| ()));
        guard.teardown().await;

        result
    }

    async fn select_proxy(&self) -> Option<ProxyEndpoint> {
        let pool = self.proxies.as_ref()?;
        pool.ensure_initialized().await;
        pool.select_proxy()
    }
}

/// Outcome reporting and session cleanup for one lease
///
/// If the lease future is dropped before `settle`, the drop reports a failure
/// and schedules the session teardown on the current runtime.
struct LeaseGuard<B: SessionBackend> {
    pool: Option<Arc<CredentialPool>>,
    credential: String,
    backend: Arc<B>,
    session: Option<Arc<B::Session>>,
    settled: bool,
}

impl<B: SessionBackend> LeaseGuard<B> {
    fn new(pool: Option<Arc<CredentialPool>>, credential: String, backend: Arc<B>) -> Self {
        Self {
            pool,
            credential,
            backend,
            session: None,
            settled: false,
        }
    }

    fn settle<E: Display>(&mut self, outcome: Result<(), E>) {
        self.settled = true;
        let Some(pool) = &self.pool else {
            return;
        };

        match outcome {
            Ok(()) => pool.report_success(&self.credential),
            Err(e) => pool.report_failure(&self.credential, &e.to_string()),
        }
    }

    /// The session stays armed until `destroy` returns, so a lease dropped
    /// mid-teardown still gets its session closed by `Drop`.
    async fn teardown(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };
        if let Err(e) = self.backend.destroy(&session).await {
            warn!(error = %e, "Error closing outbound session");
        }
        self.session = None;
    }
}

impl<B: SessionBackend> Drop for LeaseGuard<B> {
    fn drop(&mut self) {
        if !self.settled {
            if let Some(pool) = &self.pool {
                pool.report_failure(&self.credential, CANCELLED_REASON);
            }
            debug!(credential = %mask_secret(&self.credential), "Lease dropped before completion");
        }

        let Some(session) = self.session.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let backend = self.backend.clone();
                handle.spawn(async move {
                    if let Err(e) = backend.destroy(&session).await {
                        warn!(error = %e, "Error closing cancelled outbound session");
                    }
                });
            }
            Err(_) => warn!("No runtime available to close cancelled outbound session"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredentialStrategy;
    use crate::proxy::{FetchError, ProxyProvider};
    use crate::rotation::{create_algorithm, SelectionStrategy};
    use crate::session::BackendError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    struct MockSession {
        credential: String,
        proxy: Option<ProxyEndpoint>,
    }

    #[derive(Default)]
    struct MockBackend {
        created: AtomicUsize,
        destroyed: AtomicUsize,
        fail_create: bool,
        fail_destroy: bool,
        stall_first_destroy: bool,
    }

    #[async_trait]
    impl SessionBackend for MockBackend {
        type Session = MockSession;

        async fn create(
            &self,
            credential: &str,
            proxy: Option<&ProxyEndpoint>,
        ) -> Result<MockSession, BackendError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            if self.fail_create {
                return Err(BackendError::new("browser failed to start"));
            }
            Ok(MockSession {
                credential: credential.to_string(),
                proxy: proxy.cloned(),
            })
        }

        async fn destroy(&self, _session: &MockSession) -> Result<(), BackendError> {
            let calls = self.destroyed.fetch_add(1, Ordering::SeqCst);
            if self.stall_first_destroy && calls == 0 {
                std::future::pending::<()>().await;
            }
            if self.fail_destroy {
                return Err(BackendError::new("close failed"));
            }
            Ok(())
        }
    }

    struct CountingProvider {
        calls: AtomicUsize,
        count: u16,
    }

    #[async_trait]
    impl ProxyProvider for CountingProvider {
        async fn fetch(&self) -> Result<Vec<ProxyEndpoint>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..self.count)
                .map(|i| ProxyEndpoint::new("10.1.1.1", 9000 + i))
                .collect())
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[derive(Debug, PartialEq)]
    enum TestError {
        Lease(LeaseError),
        Scrape(&'static str),
    }

    impl From<LeaseError> for TestError {
        fn from(err: LeaseError) -> Self {
            TestError::Lease(err)
        }
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                TestError::Lease(e) => write!(f, "{}", e),
                TestError::Scrape(msg) => write!(f, "scrape failed: {}", msg),
            }
        }
    }

    fn credentials(secrets: &[&str]) -> Arc<CredentialPool> {
        Arc::new(CredentialPool::new(
            secrets.iter().copied(),
            CredentialStrategy::RoundRobin,
        ))
    }

    fn proxy_pool(count: u16) -> (Arc<CountingProvider>, Arc<ProxyPool>) {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            count,
        });
        let pool = Arc::new(ProxyPool::new(
            provider.clone(),
            create_algorithm(SelectionStrategy::RoundRobin),
        ));
        (provider, pool)
    }

    fn coordinator(
        creds: Arc<CredentialPool>,
        proxies: Option<Arc<ProxyPool>>,
        backend: MockBackend,
    ) -> (Arc<MockBackend>, LeaseCoordinator<MockBackend>) {
        let backend = Arc::new(backend);
        let coordinator = LeaseCoordinator::new(creds, proxies, backend.clone());
        (backend, coordinator)
    }

    #[tokio::test]
    async fn test_successful_lease_reports_success() {
        let creds = credentials(&["A"]);
        creds.report_failure("A", "earlier");
        let (backend, coordinator) = coordinator(creds.clone(), None, MockBackend::default());

        let result: Result<String, TestError> = coordinator
            .with_lease(|lease| async move {
                assert_eq!(lease.session.credential, "A");
                assert!(lease.proxy.is_none());
                Ok(format!("scraped with {}", lease.credential))
            })
            .await;

        assert_eq!(tokio_test::assert_ok!(result), "scraped with A");
        let health = creds.health("A").unwrap();
        assert_eq!(health.consecutive_failures, 0);
        assert_eq!(health.failure_count, 1);
        assert_eq!(backend.created.load(Ordering::SeqCst), 1);
        assert_eq!(backend.destroyed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_body_error_is_returned_unchanged() {
        let creds = credentials(&["A"]);
        let (backend, coordinator) = coordinator(creds.clone(), None, MockBackend::default());

        let result: Result<(), TestError> = coordinator
            .with_lease(|_lease| async { Err(TestError::Scrape("captcha")) })
            .await;

        assert_eq!(result.unwrap_err(), TestError::Scrape("captcha"));
        let health = creds.health("A").unwrap();
        assert_eq!(health.consecutive_failures, 1);
        assert_eq!(health.failure_count, 1);
        assert_eq!(backend.destroyed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_pool_skips_proxy_and_session() {
        let creds = credentials(&["A"]);
        for _ in 0..3 {
            creds.report_failure("A", "blocked");
        }
        let (provider, proxies) = proxy_pool(3);
        let (backend, coordinator) =
            coordinator(creds, Some(proxies.clone()), MockBackend::default());

        let result: Result<(), TestError> = coordinator.with_lease(|_| async { Ok(()) }).await;

        assert_eq!(
            result.unwrap_err(),
            TestError::Lease(LeaseError::CredentialsExhausted)
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert!(!proxies.is_initialized());
        assert_eq!(backend.created.load(Ordering::SeqCst), 0);
        assert_eq!(backend.destroyed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_pool_is_exhausted() {
        let (_, coordinator) = coordinator(credentials(&[]), None, MockBackend::default());
        let result: Result<(), TestError> = coordinator.with_lease(|_| async { Ok(()) }).await;
        assert!(matches!(
            result,
            Err(TestError::Lease(LeaseError::CredentialsExhausted))
        ));
    }

    #[tokio::test]
    async fn test_session_create_failure_reports_failure() {
        let creds = credentials(&["A"]);
        let backend = MockBackend {
            fail_create: true,
            ..Default::default()
        };
        let (backend, coordinator) = coordinator(creds.clone(), None, backend);

        let body_ran = AtomicUsize::new(0);
        let result: Result<(), TestError> = coordinator
            .with_lease(|_| async {
                body_ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert_eq!(
            tokio_test::assert_err!(result),
            TestError::Lease(LeaseError::SessionCreate(BackendError::new(
                "browser failed to start"
            )))
        );
        assert_eq!(body_ran.load(Ordering::SeqCst), 0);
        assert_eq!(creds.health("A").unwrap().consecutive_failures, 1);
        assert_eq!(backend.destroyed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_teardown_failure_does_not_override_result() {
        let creds = credentials(&["A"]);
        let backend = MockBackend {
            fail_destroy: true,
            ..Default::default()
        };
        let (backend, coordinator) = coordinator(creds.clone(), None, backend);

        let ok: Result<u32, TestError> = coordinator.with_lease(|_| async { Ok(7) }).await;
        assert_eq!(tokio_test::assert_ok!(ok), 7);
        assert_eq!(creds.health("A").unwrap().consecutive_failures, 0);

        let err: Result<u32, TestError> = coordinator
            .with_lease(|_| async { Err(TestError::Scrape("timeout")) })
            .await;
        assert_eq!(err.unwrap_err(), TestError::Scrape("timeout"));
        assert_eq!(backend.destroyed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_lease_binds_proxy_when_enabled() {
        let creds = credentials(&["A", "B"]);
        let (provider, proxies) = proxy_pool(2);
        let (_, coordinator) = coordinator(creds, Some(proxies), MockBackend::default());

        for expected_port in [9000, 9001, 9000] {
            let port: Result<u16, TestError> = coordinator
                .with_lease(|lease| async move {
                    let proxy = lease.proxy.clone().unwrap();
                    assert_eq!(lease.session.proxy.as_ref(), Some(&proxy));
                    Ok(proxy.port)
                })
                .await;
            assert_eq!(port.unwrap(), expected_port);
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_proxy_pool_degrades_to_direct() {
        let (_, proxies) = proxy_pool(0);
        let (_, coordinator) =
            coordinator(credentials(&["A"]), Some(proxies), MockBackend::default());

        let had_proxy: Result<bool, TestError> = coordinator
            .with_lease(|lease| async move { Ok(lease.proxy.is_some()) })
            .await;
        assert!(!had_proxy.unwrap());
    }

    #[tokio::test]
    async fn test_cancelled_lease_reports_failure_and_tears_down() {
        let creds = credentials(&["A"]);
        let (backend, coordinator) = coordinator(creds.clone(), None, MockBackend::default());

        let lease = coordinator.with_lease(|_| async {
            std::future::pending::<Result<(), TestError>>().await
        });
        let outcome = tokio::time::timeout(Duration::from_millis(20), lease).await;
        assert!(outcome.is_err());

        for _ in 0..10 {
            if backend.destroyed.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(backend.destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(creds.health("A").unwrap().consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_lease_dropped_during_teardown_still_closes_session() {
        let creds = credentials(&["A"]);
        let backend = MockBackend {
            stall_first_destroy: true,
            ..Default::default()
        };
        let (backend, coordinator) = coordinator(creds.clone(), None, backend);

        let lease = coordinator.with_lease(|_| async { Ok::<_, TestError>(()) });
        let outcome = tokio::time::timeout(Duration::from_millis(20), lease).await;
        assert!(outcome.is_err());

        for _ in 0..10 {
            if backend.destroyed.load(Ordering::SeqCst) == 2 {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(backend.destroyed.load(Ordering::SeqCst), 2);
        // the body finished, so the outcome was already recorded as a success
        assert_eq!(creds.health("A").unwrap().consecutive_failures, 0);
    }

    #[test]
    fn test_session_create_error_keeps_backend_source() {
        use std::error::Error as _;

        let err = LeaseError::SessionCreate(BackendError::new("no browser"));
        let source = err.source().and_then(|s| s.downcast_ref::<BackendError>());
        assert_eq!(source, Some(&BackendError::new("no browser")));
        assert_eq!(err.to_string(), "failed to create outbound session: no browser");
    }

    #[tokio::test]
    async fn test_with_credential_bypasses_pool_accounting() {
        let creds = credentials(&["A"]);
        let (backend, coordinator) = coordinator(creds.clone(), None, MockBackend::default());

        let result: Result<(), TestError> = coordinator
            .with_credential("custom-token".to_string(), |lease| async move {
                assert_eq!(lease.session.credential, "custom-token");
                Err(TestError::Scrape("blocked"))
            })
            .await;

        assert_eq!(result.unwrap_err(), TestError::Scrape("blocked"));
        assert_eq!(creds.health("A").unwrap(), Default::default());
        assert!(creds.health("custom-token").is_none());
        assert_eq!(backend.destroyed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_proxy_status() {
        let (_, direct) = coordinator(credentials(&["A"]), None, MockBackend::default());
        assert_eq!(direct.proxy_status().await, ProxyStatus::disabled());

        let (_, proxies) = proxy_pool(3);
        let (_, proxied) =
            coordinator(credentials(&["A"]), Some(proxies), MockBackend::default());
        let status = proxied.proxy_status().await;
        assert!(status.enabled);
        assert_eq!(status.provider, "counting");
        assert_eq!(status.proxy_count, 3);
    }
}
