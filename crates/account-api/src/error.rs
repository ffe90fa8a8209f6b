//! # Response Rendering
//!
//! The single place where an [`AccountError`] or a success payload becomes an
//! HTTP response. The status code is derived from the error kind alone; the
//! body is the uniform envelope from `account_core::envelope`.
//!
//! Handlers never call these directly; they return `Result<T, AccountError>`
//! to the operation pipeline, which renders once. Middleware that rejects a
//! request before a handler runs (rate limit, authentication, fallback) uses
//! [`render_error`] so those responses share the same envelope.

use account_core::{AccountError, ErrorEnvelope, SuccessEnvelope};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// HTTP status for `err`, as fixed by its kind.
pub fn status_for(err: &AccountError) -> StatusCode {
    StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Render the error envelope. Details are taken as already masked and the
/// cause chain is never serialized.
pub fn render_error(request_id: &str, err: &AccountError) -> Response {
    let mut response = (status_for(err), Json(ErrorEnvelope::from_error(request_id, err))).into_response();
    if err.is_rate_limit() {
        if let Some(secs) = err.details().get("retry_after_secs").and_then(|v| v.as_u64()) {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
    }
    response
}

/// Render the success envelope under `status`. `204 No Content` carries no
/// body at all.
pub fn render_success<T: Serialize>(request_id: &str, status: StatusCode, data: T) -> Response {
    if status == StatusCode::NO_CONTENT {
        return StatusCode::NO_CONTENT.into_response();
    }
    (status, Json(SuccessEnvelope::new(request_id, data))).into_response()
}
