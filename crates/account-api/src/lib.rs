//! # account-api: HTTP Edge of the Account Service
//!
//! Decodes and validates `/accounts` requests, authorizes the caller,
//! delegates to the account backend through [`account_client`], and renders
//! every outcome as the uniform envelope from [`account_core::envelope`].
//!
//! ## API Surface
//!
//! | Prefix | Module | Auth |
//! |---|---|---|
//! | `/accounts/auth/*` | [`routes::auth`] | public |
//! | `/accounts/password/{forgot,reset}` | [`routes::password`] | public |
//! | `/accounts/password/change` | [`routes::password`] | bearer |
//! | `/accounts/email/*` | [`routes::email`] | public |
//! | `/accounts`, `/accounts/{id}`, `/accounts/profile*` | [`routes::users`] | bearer |
//! | `/accounts/search*`, `/accounts/branch/*` | [`routes::search`] | bearer |
//! | `/accounts/manage/*` | [`routes::manage`] | bearer |
//! | `/health/*`, `/metrics`, `/openapi.json` | this module, [`openapi`] | public |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! RequestContext → CORS → TraceLayer → RequestLog
//!   → /accounts: RateLimit → DomainTag → [Auth] → Handler (Operation)
//! ```

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod logging;
pub mod login_guard;
pub mod middleware;
pub mod openapi;
pub mod pipeline;
pub mod policy;
pub mod routes;
pub mod state;
pub mod validation;

use account_core::{AccountError, DOMAIN_ACCOUNT};
use axum::extract::{Request, State};
use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::error::render_error;
use crate::extractors::{RequestId, IDEMPOTENCY_KEY_HEADER, REQUEST_ID_HEADER};
use crate::middleware::context::request_context_middleware;
use crate::middleware::request_log::request_log_middleware;
use crate::state::AppState;

/// Assemble the application router.
///
/// Health probes, `/metrics` and `/openapi.json` sit outside `/accounts`:
/// unauthenticated and not rate limited.
pub fn app(state: AppState) -> Router {
    let mut operational = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .merge(openapi::router());
    if state.metrics.is_some() {
        operational = operational.route("/metrics", get(middleware::metrics::prometheus_metrics));
    }

    Router::new()
        .nest(routes::ACCOUNTS_PREFIX, routes::accounts(&state))
        .merge(operational)
        .fallback(route_not_found)
        .layer(from_fn(request_log_middleware))
        .layer(middleware::tracing_layer::layer())
        .layer(cors_layer(&state.config.allowed_origins))
        .layer(from_fn_with_state(state.clone(), request_context_middleware))
        .with_state(state)
}

/// CORS from the configured origins. `*` allows any origin; an empty list
/// allows none.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(REQUEST_ID_HEADER),
            HeaderName::from_static(IDEMPOTENCY_KEY_HEADER),
        ])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)]);
    if allowed_origins.iter().any(|o| o == "*") {
        return base.allow_origin(AllowOrigin::any());
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(origins))
}

/// Liveness probe. 200 while the process runs.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe. 503 until a backend adapter is configured.
async fn readiness(State(state): State<AppState>) -> Response {
    match state.backend() {
        Ok(_) => (StatusCode::OK, "ready").into_response(),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "account backend not configured").into_response(),
    }
}

async fn route_not_found(request: Request) -> Response {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    let err = AccountError::not_found(DOMAIN_ACCOUNT, "route", request.method().as_str())
        .with_message("no route matches this request");
    render_error(&request_id, &err)
}
