//! # Structured Log Events
//!
//! Every log line the edge layer writes goes through one of these helpers,
//! each emitting a `tracing` event with a stable `event` field:
//!
//! | `event` | Helper |
//! |---|---|
//! | `api_request` | [`api_request`] |
//! | `validation_error` | [`validation_error`] |
//! | `security_event` | [`security_event`] |
//! | `performance` | [`performance`] |
//! | `user_activity` | [`user_activity`] |
//! | `auth_attempt` | [`auth_attempt`] |
//! | `operation_start` / `operation_end` | [`operation_start`], [`operation_end`] |
//! | `error` | [`error`] |
//!
//! `service_call` events are written by the backend adapter.
//!
//! Values that may carry user input are masked before they reach a helper.
//! The request id is not a parameter: events inherit it from the enclosing
//! `request` span opened by the request-id middleware.

use account_core::masking::mask_email;
use account_core::{AccountError, Details};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

/// Operations slower than this emit a `performance` event.
pub const SLOW_OPERATION_MS: u64 = 1000;

/// Security event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Install the global subscriber. JSON output includes the fields of every
/// enclosing span, so each line carries the request id.
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

pub fn api_request(method: &str, path: &str, status: u16, duration_ms: u64, client_ip: &str) {
    if status >= 500 {
        tracing::error!(event = "api_request", method, path, status, duration_ms, client_ip, "request completed");
    } else if status >= 400 {
        tracing::warn!(event = "api_request", method, path, status, duration_ms, client_ip, "request completed");
    } else {
        tracing::info!(event = "api_request", method, path, status, duration_ms, client_ip, "request completed");
    }
}

/// One failed validation rule. `rejected` must already be masked.
pub fn validation_error(field: &str, rule: &str, rejected: Option<&Value>) {
    let rejected = rejected.map(Value::to_string).unwrap_or_default();
    tracing::info!(event = "validation_error", field, rule, rejected = %rejected, "validation failed");
}

pub fn security_event(name: &str, severity: Severity, detail: &str) {
    let sev = severity.as_str();
    match severity {
        Severity::Low => {
            tracing::info!(event = "security_event", security_event = name, severity = sev, detail, "security event")
        }
        Severity::Medium => {
            tracing::warn!(event = "security_event", security_event = name, severity = sev, detail, "security event")
        }
        Severity::High | Severity::Critical => {
            tracing::error!(event = "security_event", security_event = name, severity = sev, detail, "security event")
        }
    }
}

pub fn performance(operation: &str, duration_ms: u64) {
    tracing::warn!(event = "performance", operation, duration_ms, threshold_ms = SLOW_OPERATION_MS, "slow operation");
}

pub fn user_activity(user_id: i64, action: &str, target_id: Option<i64>) {
    tracing::info!(event = "user_activity", user_id, action, target_id, "user activity");
}

/// Login attempt outcome. The email is masked here.
pub fn auth_attempt(email: &str, success: bool, reason: &str) {
    let email = mask_email(email);
    if success {
        tracing::info!(event = "auth_attempt", email = %email, success, reason, "authentication attempt");
    } else {
        tracing::warn!(event = "auth_attempt", email = %email, success, reason, "authentication attempt");
    }
}

pub fn operation_start(operation: &str, user_id: Option<i64>) {
    tracing::debug!(event = "operation_start", operation, user_id, "operation started");
}

pub fn operation_end(
    operation: &str,
    status: u16,
    duration_ms: u64,
    error: Option<&AccountError>,
    fields: &Details,
    cancelled: bool,
) {
    let kind = error.map(|e| e.kind().as_str());
    let code = error.map(|e| e.code().to_string());
    let fields = Value::Object(fields.clone()).to_string();
    tracing::info!(
        event = "operation_end",
        operation,
        status_code = status,
        duration_ms,
        error_kind = kind,
        error_code = code.as_deref(),
        fields = %fields,
        cancelled,
        "operation finished"
    );
}

/// Log a terminal error with its full context. Details are already masked;
/// the cause chain appears here and nowhere else.
pub fn error(err: &AccountError) {
    let details = Value::Object(err.details().clone()).to_string();
    let causes = err.cause_chain();
    let (kind, code, domain, layer) = (err.kind().as_str(), err.code(), err.domain(), err.layer().as_str());
    let operation = err.operation().unwrap_or_default();
    if err.is_server_side() {
        tracing::error!(
            event = "error", kind, code, domain, operation, layer,
            details = %details, causes = ?causes, "request failed"
        );
    } else {
        tracing::warn!(
            event = "error", kind, code, domain, operation, layer,
            details = %details, causes = ?causes, "request failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use account_core::DOMAIN_ACCOUNT;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn auth_attempt_masks_email() {
        auth_attempt("alice@example.com", false, "password_mismatch");
        assert!(logs_contain("a***e@example.com"));
        assert!(!logs_contain("alice@example.com"));
        assert!(logs_contain("password_mismatch"));
    }

    #[traced_test]
    #[test]
    fn security_event_carries_severity() {
        security_event("failed_login_attempt", Severity::Medium, "attempt 1");
        assert!(logs_contain("failed_login_attempt"));
        assert!(logs_contain("medium"));
    }

    #[traced_test]
    #[test]
    fn error_logs_cause_chain() {
        let err = AccountError::system(DOMAIN_ACCOUNT, "store")
            .with_cause(std::io::Error::other("disk on fire"));
        error(&err);
        assert!(logs_contain("disk on fire"));
        assert!(logs_contain("internal_error"));
    }
}
