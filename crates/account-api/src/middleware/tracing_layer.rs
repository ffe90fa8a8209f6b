//! # Request/Response Tracing
//!
//! `tower_http::trace::TraceLayer` with spans named after the matched route
//! template instead of the URI.

use axum::extract::MatchedPath;
use axum::http::Request;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{MakeSpan, TraceLayer};
use tracing::Span;

#[derive(Debug, Clone, Copy, Default)]
pub struct RouteSpan;

impl<B> MakeSpan<B> for RouteSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let route = request
            .extensions()
            .get::<MatchedPath>()
            .map_or("unmatched", MatchedPath::as_str);
        tracing::debug_span!("http", method = %request.method(), route)
    }
}

/// Build the `TraceLayer` for the account API.
pub fn layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>, RouteSpan> {
    TraceLayer::new_for_http().make_span_with(RouteSpan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_ignores_raw_uri() {
        let request = Request::builder()
            .uri("/accounts/email/verify/secret-token-value")
            .body(())
            .unwrap();
        let span = RouteSpan.make_span(&request);
        assert!(format!("{span:?}").find("secret-token-value").is_none());
    }
}
