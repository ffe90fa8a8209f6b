//! # Operation Pipeline
//!
//! Every handler opens an [`Operation`] on entry and finishes it with
//! [`Operation::respond`], which renders the envelope, records metrics, and
//! emits `operation_end`. If the handler future is dropped first (the
//! client disconnected), the guard's `Drop` emits `operation_end` with
//! status 499 and `cancelled = true`; nothing is written to the socket.

use std::time::Instant;

use account_client::CallContext;
use account_core::masking::mask_field;
use account_core::{AccountError, Details};
use axum::http::StatusCode;
use axum::response::Response;
use serde::Serialize;
use serde_json::Value;

use crate::error::{render_error, render_success, status_for};
use crate::extractors::RequestContext;
use crate::logging::{self, SLOW_OPERATION_MS};

/// Status logged for operations abandoned by the client.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

pub const REQUESTS_TOTAL: &str = "account_http_requests_total";
pub const REQUEST_DURATION: &str = "account_http_request_duration_seconds";

/// One in-flight handler invocation.
#[derive(Debug)]
pub struct Operation {
    name: &'static str,
    request_id: String,
    started: Instant,
    fields: Details,
    finished: bool,
}

impl Operation {
    pub fn start(name: &'static str, ctx: &RequestContext) -> Self {
        logging::operation_start(name, ctx.caller.as_ref().map(|c| c.user_id));
        Self {
            name,
            request_id: ctx.request_id.clone(),
            started: Instant::now(),
            fields: ctx.fields.clone(),
            finished: false,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn call_context(&self) -> CallContext {
        CallContext::new(self.request_id.clone())
    }

    /// Attach a field to `operation_end`, masked by key.
    pub fn set_field(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), mask_field(key, value.into()));
    }

    /// Render `result`: `status` on success, the kind's status on error.
    /// Errors are tagged with the operation name before logging.
    pub fn respond<T: Serialize>(mut self, status: StatusCode, result: Result<T, AccountError>) -> Response {
        let (response, error) = match result {
            Ok(data) => (render_success(&self.request_id, status, data), None),
            Err(err) => {
                let err = match err.operation() {
                    Some(_) => err,
                    None => err.with_operation(self.name),
                };
                logging::error(&err);
                (render_error(&self.request_id, &err), Some(err))
            }
        };
        let code = response.status().as_u16();
        debug_assert!(error.as_ref().map_or(true, |e| status_for(e).as_u16() == code));
        self.finish(code, error.as_ref());
        response
    }

    fn finish(&mut self, status: u16, error: Option<&AccountError>) {
        self.finished = true;
        let elapsed = self.started.elapsed();
        let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        metrics::counter!(REQUESTS_TOTAL, "operation" => self.name, "status" => status.to_string()).increment(1);
        metrics::histogram!(REQUEST_DURATION, "operation" => self.name).record(elapsed.as_secs_f64());
        if duration_ms > SLOW_OPERATION_MS {
            logging::performance(self.name, duration_ms);
        }
        logging::operation_end(self.name, status, duration_ms, error, &self.fields, false);
    }
}

impl Drop for Operation {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let duration_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        metrics::counter!(REQUESTS_TOTAL, "operation" => self.name, "status" => CLIENT_CLOSED_REQUEST.to_string())
            .increment(1);
        logging::operation_end(self.name, CLIENT_CLOSED_REQUEST, duration_ms, None, &self.fields, true);
    }
}
