//! # Application State
//!
//! Shared, immutable-after-startup handles passed to every handler and
//! middleware through axum's `State`. Per-request data lives in request
//! extensions, never here.

use std::sync::Arc;

use account_client::mapping::SERVICE_NAME;
use account_client::AccountBackend;
use account_core::{AccountError, DOMAIN_ACCOUNT};
use metrics_exporter_prometheus::PrometheusHandle;

use crate::auth::{BackendTokenVerifier, TokenVerifier};
use crate::config::AccountConfig;
use crate::login_guard::{InMemoryLoginAttempts, LoginAttempts};
use crate::middleware::rate_limit::{FixedWindowLimiter, RateLimiter};
use crate::validation::Validator;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AccountConfig>,
    pub backend: Option<AccountBackend>,
    pub validator: Arc<Validator>,
    pub verifier: Option<Arc<dyn TokenVerifier>>,
    pub login_attempts: Arc<dyn LoginAttempts>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub metrics: Option<PrometheusHandle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("backend", &self.backend.is_some())
            .field("verifier", &self.verifier.is_some())
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// State without a backend: health probes work, account routes answer 503.
    pub fn new(config: AccountConfig) -> Self {
        let login_attempts = InMemoryLoginAttempts::new(config.max_login_attempts, config.lockout());
        let rate_limiter = FixedWindowLimiter::per_minute(config.rate_limit.requests_per_minute);
        Self {
            validator: Arc::new(Validator::new(config.password)),
            config: Arc::new(config),
            backend: None,
            verifier: None,
            login_attempts: Arc::new(login_attempts),
            rate_limiter: Arc::new(rate_limiter),
            metrics: None,
        }
    }

    /// Attach the backend, and with it backend token verification and
    /// `uniqueemail` lookups.
    pub fn with_backend(mut self, backend: AccountBackend) -> Self {
        self.validator = Arc::new(Validator::new(self.config.password).with_backend(backend.clone()));
        self.verifier = Some(Arc::new(BackendTokenVerifier::new(backend.clone())));
        self.backend = Some(backend);
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_login_attempts(mut self, store: Arc<dyn LoginAttempts>) -> Self {
        self.login_attempts = store;
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = limiter;
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// The backend adapter, or a retryable 503 when none is configured.
    pub fn backend(&self) -> Result<&AccountBackend, AccountError> {
        self.backend.as_ref().ok_or_else(|| {
            AccountError::external_service(DOMAIN_ACCOUNT, SERVICE_NAME, "configure", true)
                .with_message("the account service is not configured")
        })
    }

    pub fn verifier(&self) -> Result<&Arc<dyn TokenVerifier>, AccountError> {
        self.verifier.as_ref().ok_or_else(|| {
            AccountError::external_service(DOMAIN_ACCOUNT, SERVICE_NAME, "ValidateToken", true)
                .with_message("the account service is not configured")
        })
    }

    /// Body cap from configuration.
    pub fn body_limit(&self) -> usize {
        self.config.body_limit_bytes
    }
}
