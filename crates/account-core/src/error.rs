//! # Error Taxonomy: Domain-Aware Error Values
//!
//! A closed set of error kinds with a deterministic HTTP status mapping and
//! stable, machine-readable codes. Every failure the edge layer can produce
//! is an [`AccountError`]; handlers branch on it only through the
//! classification predicates (`is_validation`, `is_conflict`, ...), never by
//! inspecting messages.
//!
//! ## Design
//!
//! - The HTTP status is a function of [`ErrorKind`] alone, with the single
//!   split of `ExternalService` on the retryable flag (503 vs 502).
//! - `details` values are masked when inserted (see [`crate::masking`]).
//! - The cause chain is kept for logging and never rendered to clients.
//! - [`ErrorCollection`] accumulates field violations and yields one
//!   composite `Validation` error keyed by field.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::masking;

/// Domain tag of the account service.
pub const DOMAIN_ACCOUNT: &str = "account";

/// Field-keyed details attached to an error.
pub type Details = Map<String, Value>;

/// Closed set of error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or semantically invalid input.
    Validation,
    /// Caller identity missing or not proven.
    Authentication,
    /// Caller is known but not allowed.
    Authorization,
    /// Referenced resource does not exist.
    NotFound,
    /// Duplicate or conflicting state.
    Conflict,
    /// A business rule rejected an otherwise valid request.
    BusinessRule,
    /// Caller exceeded a rate limit.
    RateLimit,
    /// The backend or another dependency failed.
    ExternalService,
    /// Unexpected internal failure.
    System,
    /// Security policy violation.
    Security,
}

impl ErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [ErrorKind; 10] = [
        ErrorKind::Validation,
        ErrorKind::Authentication,
        ErrorKind::Authorization,
        ErrorKind::NotFound,
        ErrorKind::Conflict,
        ErrorKind::BusinessRule,
        ErrorKind::RateLimit,
        ErrorKind::ExternalService,
        ErrorKind::System,
        ErrorKind::Security,
    ];

    /// Stable wire name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::BusinessRule => "business_rule",
            Self::RateLimit => "rate_limit",
            Self::ExternalService => "external_service",
            Self::System => "system",
            Self::Security => "security",
        }
    }

    /// HTTP status for this kind. Only `ExternalService` consults
    /// `retryable`.
    pub fn http_status(self, retryable: bool) -> u16 {
        match self {
            Self::Validation => 400,
            Self::Authentication => 401,
            Self::Authorization | Self::Security => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::BusinessRule => 422,
            Self::RateLimit => 429,
            Self::ExternalService if retryable => 503,
            Self::ExternalService => 502,
            Self::System => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layer that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Handler,
    Service,
    External,
}

impl Layer {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Handler => "handler",
            Self::Service => "service",
            Self::External => "external",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// A single error value of the taxonomy.
///
/// Builder methods consume and return the value, so accumulating details
/// never mutates an error another component still holds.
#[derive(Error, Debug, Clone)]
#[error("[{domain}:{code}] {message}")]
pub struct AccountError {
    kind: ErrorKind,
    code: Cow<'static, str>,
    message: String,
    domain: Cow<'static, str>,
    layer: Layer,
    operation: Option<Cow<'static, str>>,
    retryable: bool,
    details: Details,
    #[source]
    cause: Option<Cause>,
}

impl AccountError {
    /// Base constructor. Prefer the kind-specific constructors below.
    pub fn new(
        kind: ErrorKind,
        code: impl Into<Cow<'static, str>>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            domain: Cow::Borrowed(DOMAIN_ACCOUNT),
            layer: Layer::Handler,
            operation: None,
            retryable: false,
            details: Details::new(),
            cause: None,
        }
    }

    // ── Constructors ────────────────────────────────────────────────

    /// Invalid value for `field`.
    pub fn validation(
        domain: impl Into<Cow<'static, str>>,
        field: &str,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorKind::Validation, "validation_error", message)
            .with_domain(domain)
            .with_detail("field", field)
    }

    /// Authentication failed for `reason`. The reason is logged, not shown.
    pub fn authentication(domain: impl Into<Cow<'static, str>>, reason: &str) -> Self {
        Self::new(
            ErrorKind::Authentication,
            "authentication_failed",
            "authentication required",
        )
        .with_domain(domain)
        .with_detail("reason", reason)
    }

    /// Caller may not perform `action` on `resource`.
    pub fn authorization(
        domain: impl Into<Cow<'static, str>>,
        action: &str,
        resource: &str,
    ) -> Self {
        Self::new(
            ErrorKind::Authorization,
            "access_denied",
            format!("insufficient permissions to {action} {resource}"),
        )
        .with_domain(domain)
        .with_detail("action", action)
        .with_detail("resource", resource)
    }

    /// `resource` identified by `identifier` does not exist.
    pub fn not_found(
        domain: impl Into<Cow<'static, str>>,
        resource: &str,
        identifier: impl Into<Value>,
    ) -> Self {
        Self::new(
            ErrorKind::NotFound,
            format!("{resource}_not_found"),
            format!("{resource} not found"),
        )
        .with_domain(domain)
        .with_detail("resource", resource)
        .with_detail("identifier", identifier)
    }

    /// A `resource` with the same `field` value already exists.
    pub fn conflict(
        domain: impl Into<Cow<'static, str>>,
        resource: &str,
        field: &str,
        value: impl Into<Value>,
    ) -> Self {
        Self::new(
            ErrorKind::Conflict,
            format!("duplicate_{field}"),
            format!("a {resource} with this {field} already exists"),
        )
        .with_domain(domain)
        .with_detail("resource", resource)
        .with_detail(field, value)
    }

    /// Business `rule` rejected the request. The rule name is the code.
    pub fn business_rule(
        domain: impl Into<Cow<'static, str>>,
        rule: impl Into<Cow<'static, str>>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorKind::BusinessRule, rule, message).with_domain(domain)
    }

    /// Caller exceeded a rate limit.
    pub fn rate_limit(domain: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimit, "rate_limit_exceeded", message).with_domain(domain)
    }

    /// A call to `service` failed during `operation`.
    pub fn external_service(
        domain: impl Into<Cow<'static, str>>,
        service: &str,
        operation: &str,
        retryable: bool,
    ) -> Self {
        let (code, message) = if retryable {
            ("service_unavailable", "the account service is temporarily unavailable")
        } else {
            ("external_service_error", "the account service could not complete the request")
        };
        let mut err = Self::new(ErrorKind::ExternalService, code, message)
            .with_domain(domain)
            .with_layer(Layer::External)
            .with_detail("service", service)
            .with_detail("service_operation", operation);
        err.retryable = retryable;
        err
    }

    /// Unexpected failure inside `component`.
    pub fn system(domain: impl Into<Cow<'static, str>>, component: &str) -> Self {
        Self::new(ErrorKind::System, "internal_error", "an internal error occurred")
            .with_domain(domain)
            .with_detail("component", component)
    }

    /// Security policy violation identified by `event`.
    pub fn security(
        domain: impl Into<Cow<'static, str>>,
        event: impl Into<Cow<'static, str>>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorKind::Security, event, message).with_domain(domain)
    }

    // ── Builders ────────────────────────────────────────────────────

    pub fn with_domain(mut self, domain: impl Into<Cow<'static, str>>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_code(mut self, code: impl Into<Cow<'static, str>>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.layer = layer;
        self
    }

    pub fn with_operation(mut self, operation: impl Into<Cow<'static, str>>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Attach a detail. The value is masked according to `key`.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = masking::mask_field(&key, value.into());
        self.details.insert(key, value);
        self
    }

    /// Attach several details at once, masking each.
    pub fn with_details(mut self, details: Details) -> Self {
        for (k, v) in masking::mask_map(details) {
            self.details.insert(k, v);
        }
        self
    }

    /// Attach the underlying cause. It is logged but never rendered.
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn operation(&self) -> Option<&str> {
        self.operation.as_deref()
    }

    pub fn details(&self) -> &Details {
        &self.details
    }

    /// HTTP status derived from the kind.
    pub fn http_status(&self) -> u16 {
        self.kind.http_status(self.retryable)
    }

    /// Rendered cause chain, outermost first.
    pub fn cause_chain(&self) -> Vec<String> {
        let mut chain = Vec::new();
        let mut next: Option<&(dyn std::error::Error + 'static)> =
            self.cause.as_deref().map(|c| c as &(dyn std::error::Error + 'static));
        while let Some(err) = next {
            chain.push(err.to_string());
            next = err.source();
        }
        chain
    }

    // ── Classification ──────────────────────────────────────────────

    pub fn is_validation(&self) -> bool {
        self.kind == ErrorKind::Validation
    }

    pub fn is_authentication(&self) -> bool {
        self.kind == ErrorKind::Authentication
    }

    pub fn is_authorization(&self) -> bool {
        self.kind == ErrorKind::Authorization
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    pub fn is_conflict(&self) -> bool {
        self.kind == ErrorKind::Conflict
    }

    pub fn is_business_rule(&self) -> bool {
        self.kind == ErrorKind::BusinessRule
    }

    pub fn is_rate_limit(&self) -> bool {
        self.kind == ErrorKind::RateLimit
    }

    pub fn is_external_service(&self) -> bool {
        self.kind == ErrorKind::ExternalService
    }

    pub fn is_system(&self) -> bool {
        self.kind == ErrorKind::System
    }

    pub fn is_security(&self) -> bool {
        self.kind == ErrorKind::Security
    }

    /// Safe to retry with the same parameters.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// 5xx-class errors whose message is replaced by a generic one.
    pub fn is_server_side(&self) -> bool {
        self.http_status() >= 500
    }
}

// ── Error collection ────────────────────────────────────────────────

/// One failed field check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub rule: String,
    pub message: String,
    /// Offending value, already masked. `None` when absent.
    pub rejected: Option<Value>,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            rule: rule.into(),
            message: message.into(),
            rejected: None,
        }
    }

    /// Record the rejected value, masked under the field name.
    pub fn with_rejected(mut self, value: impl Into<Value>) -> Self {
        self.rejected = Some(masking::mask_field(&self.field, value.into()));
        self
    }
}

/// Accumulates validation failures under one domain.
#[derive(Debug, Clone)]
pub struct ErrorCollection {
    domain: Cow<'static, str>,
    violations: Vec<FieldViolation>,
}

impl ErrorCollection {
    pub fn new(domain: impl Into<Cow<'static, str>>) -> Self {
        Self {
            domain: domain.into(),
            violations: Vec::new(),
        }
    }

    /// Add a violation for `field`.
    pub fn add(&mut self, field: impl Into<String>, rule: impl Into<String>, message: impl Into<String>) {
        self.violations.push(FieldViolation::new(field, rule, message));
    }

    pub fn push(&mut self, violation: FieldViolation) {
        self.violations.push(violation);
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    /// Composite error, or `None` if nothing was collected. A single
    /// violation keeps its specific code; several use `validation_failed`.
    pub fn into_error(self) -> Option<AccountError> {
        if self.violations.is_empty() {
            return None;
        }
        let mut details = Details::new();
        for v in &self.violations {
            match details.get_mut(&v.field) {
                Some(Value::String(existing)) => {
                    existing.push_str("; ");
                    existing.push_str(&v.message);
                }
                _ => {
                    details.insert(v.field.clone(), Value::String(v.message.clone()));
                }
            }
        }
        let code: Cow<'static, str> = match self.violations.as_slice() {
            [only] if only.rule.starts_with("invalid_") => Cow::Owned(only.rule.clone()),
            _ => Cow::Borrowed("validation_failed"),
        };
        let message = match self.violations.as_slice() {
            [only] => format!("{}: {}", only.field, only.message),
            many => format!("{} fields failed validation", many.len()),
        };
        // Field messages never carry input values; stored unmasked.
        let mut err = AccountError::new(ErrorKind::Validation, code, message).with_domain(self.domain);
        err.details = details;
        Some(err)
    }

    /// `Ok(())` if empty, else the composite error.
    pub fn into_result(self) -> Result<(), AccountError> {
        match self.into_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masking::MASK;

    #[test]
    fn status_is_a_function_of_kind() {
        let expected = [
            (ErrorKind::Validation, 400),
            (ErrorKind::Authentication, 401),
            (ErrorKind::Authorization, 403),
            (ErrorKind::NotFound, 404),
            (ErrorKind::Conflict, 409),
            (ErrorKind::BusinessRule, 422),
            (ErrorKind::RateLimit, 429),
            (ErrorKind::ExternalService, 502),
            (ErrorKind::System, 500),
            (ErrorKind::Security, 403),
        ];
        for (kind, status) in expected {
            assert_eq!(AccountError::new(kind, "c", "m").http_status(), status, "{kind}");
        }
    }

    #[test]
    fn retryable_external_service_is_503() {
        let err = AccountError::external_service(DOMAIN_ACCOUNT, "account_rpc", "find_by_id", true);
        assert_eq!(err.http_status(), 503);
        assert!(err.is_retryable());
        assert_eq!(err.layer(), Layer::External);
        let err = AccountError::external_service(DOMAIN_ACCOUNT, "account_rpc", "register", false);
        assert_eq!(err.http_status(), 502);
    }

    #[test]
    fn only_external_service_depends_on_retryable() {
        for kind in ErrorKind::ALL {
            if kind != ErrorKind::ExternalService {
                assert_eq!(kind.http_status(true), kind.http_status(false));
            }
        }
    }

    #[test]
    fn with_detail_masks_sensitive_values() {
        let err = AccountError::validation(DOMAIN_ACCOUNT, "password", "too short")
            .with_detail("password", "hunter2")
            .with_detail("email", "alice@example.com");
        assert_eq!(err.details()["password"], MASK);
        assert_eq!(err.details()["email"], "a***e@example.com");
        assert_eq!(err.details()["field"], "password");
    }

    #[test]
    fn with_detail_returns_new_value() {
        let base = AccountError::not_found(DOMAIN_ACCOUNT, "user", 7);
        let enriched = base.clone().with_detail("hint", "check the id");
        assert!(!base.details().contains_key("hint"));
        assert!(enriched.details().contains_key("hint"));
        assert_eq!(base.code(), "user_not_found");
    }

    #[test]
    fn predicates_match_kind() {
        let err = AccountError::conflict(DOMAIN_ACCOUNT, "user", "email", "a@b.co");
        assert!(err.is_conflict());
        assert!(!err.is_validation());
        assert_eq!(err.code(), "duplicate_email");
    }

    #[test]
    fn cause_chain_is_recorded() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "socket closed");
        let err = AccountError::system(DOMAIN_ACCOUNT, "rpc").with_cause(io);
        assert_eq!(err.cause_chain(), vec!["socket closed".to_string()]);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn collection_yields_field_keyed_composite() {
        let mut errors = ErrorCollection::new(DOMAIN_ACCOUNT);
        errors.add("page", "min", "must be at least 1");
        errors.add("page_size", "max", "must be at most 100");
        errors.add("page", "numeric", "must be a number");
        let err = errors.into_error().expect("composite");
        assert!(err.is_validation());
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.code(), "validation_failed");
        assert_eq!(err.details()["page"], "must be at least 1; must be a number");
        assert_eq!(err.details()["page_size"], "must be at most 100");
    }

    #[test]
    fn collection_messages_are_not_masked_by_field_name() {
        let mut errors = ErrorCollection::new(DOMAIN_ACCOUNT);
        errors.add("password", "strongpassword", "needs an uppercase letter");
        let err = errors.into_error().expect("composite");
        assert_eq!(err.details()["password"], "needs an uppercase letter");
    }

    #[test]
    fn single_invalid_violation_keeps_code() {
        let mut errors = ErrorCollection::new(DOMAIN_ACCOUNT);
        errors.add("id", "invalid_id", "must be a positive integer");
        let err = errors.into_error().expect("composite");
        assert_eq!(err.code(), "invalid_id");
    }

    #[test]
    fn empty_collection_is_ok() {
        assert!(ErrorCollection::new(DOMAIN_ACCOUNT).into_result().is_ok());
    }
}
