//! # Middleware Stack
//!
//! - [`context`]: request id, domain tag, client address, `request` span.
//! - [`request_log`]: one `api_request` line per request.
//! - [`tracing_layer`]: `TraceLayer` keyed by the matched route.
//! - [`rate_limit`]: per-client fixed-window budget.
//! - [`metrics`]: Prometheus recorder and scrape handler.

pub mod context;
pub mod metrics;
pub mod rate_limit;
pub mod request_log;
pub mod tracing_layer;
