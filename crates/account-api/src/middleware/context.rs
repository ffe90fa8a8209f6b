//! Request context middleware.
//!
//! Outermost layer. Honors an incoming `X-Request-Id` (or mints a
//! time-ordered UUIDv7), resolves the client address, and runs the rest of
//! the stack inside a `request` span so every event carries the id. The id
//! is echoed on the response.
//!
//! The span records the matched route template, never the raw URI: paths
//! such as `/accounts/email/verify/{token}` carry credentials.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, MatchedPath, Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;
use uuid::Uuid;

use crate::extractors::{client_ip, ClientIp, DomainTag, RequestId, REQUEST_ID_HEADER};
use crate::state::AppState;

const MAX_REQUEST_ID_LEN: usize = 128;

fn acceptable(id: &str) -> bool {
    (1..=MAX_REQUEST_ID_LEN).contains(&id.len())
        && id.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':'))
}

/// Fresh request id.
pub fn mint_request_id() -> String {
    Uuid::now_v7().to_string()
}

/// Route template of `request`, or `"unmatched"`.
pub fn route_of<B>(request: &axum::http::Request<B>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |p| p.as_str().to_string())
}

pub async fn request_context_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let incoming = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|id| acceptable(id))
        .map(str::to_string);
    let request_id = incoming.unwrap_or_else(mint_request_id);
    let header = HeaderValue::from_str(&request_id).ok();
    if let Some(value) = &header {
        request.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
    }

    let peer = request.extensions().get::<ConnectInfo<SocketAddr>>().map(|c| c.0);
    let ip = client_ip(request.headers(), peer, state.config.trust_forwarded_for);
    request.extensions_mut().insert(RequestId(request_id.clone()));
    request.extensions_mut().insert(ClientIp(ip));

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %route_of(&request),
    );
    let mut response = next.run(request).instrument(span).await;
    if let Some(value) = header {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Tags requests under `/accounts` with the account domain.
pub async fn domain_middleware(mut request: Request, next: Next) -> Response {
    request
        .extensions_mut()
        .insert(DomainTag(account_core::DOMAIN_ACCOUNT));
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incoming_ids_are_screened() {
        assert!(acceptable("req-123_abc.9:1"));
        assert!(!acceptable(""));
        assert!(!acceptable("has space"));
        assert!(!acceptable("line\nbreak"));
        assert!(!acceptable(&"x".repeat(MAX_REQUEST_ID_LEN + 1)));
    }

    #[test]
    fn minted_ids_are_time_ordered() {
        let a = mint_request_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = mint_request_id();
        assert!(acceptable(&a));
        assert!(a < b);
    }
}
