//! Per-request access log.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::extractors::ClientIp;
use crate::logging;
use crate::middleware::context::route_of;

/// Emit one `api_request` event with the final status once the inner stack
/// has produced a response.
pub async fn request_log_middleware(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let path = route_of(&request);
    let client_ip = request
        .extensions()
        .get::<ClientIp>()
        .map_or_else(|| "unknown".to_string(), |ip| ip.0.clone());

    let response = next.run(request).await;

    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    logging::api_request(&method, &path, response.status().as_u16(), duration_ms, &client_ip);
    response
}
