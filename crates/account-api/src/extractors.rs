//! # Request Utilities
//!
//! Everything a handler needs to turn raw request parts into typed values,
//! each failure expressed as an [`AccountError`]:
//!
//! - [`RequestContext`]: request id, domain tag, caller identity, client IP
//! - [`decode_body`]: capped, strict JSON decoding
//! - [`path_id`], [`parse_int_id`], [`parse_string`]: path parameters
//! - [`parse_page_request`]: pagination and sort from the query string
//! - [`client_ip`], [`bearer_token`], [`idempotency_key`]: headers
//!
//! Handlers take raw parts (`Body`, `RawQuery`, `Path<String>`) and parse
//! them here, so no axum rejection ever reaches a client.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;

use account_client::types::PageRequest;
use account_client::CallContext;
use account_core::masking::mask_field;
use account_core::{AccountError, Details, ErrorCollection, Secret, SortOrder, DOMAIN_ACCOUNT};
use axum::body::{Body, Bytes};
use axum::extract::rejection::PathRejection;
use axum::extract::{ConnectInfo, FromRequestParts, Path};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::auth::CallerIdentity;
use crate::logging::{self, Severity};

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

// ---------------------------------------------------------------------------
// Request context
// ---------------------------------------------------------------------------

/// Request id assigned by the request-id middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Domain tag assigned by the domain middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainTag(pub &'static str);

/// Resolved client address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

/// Per-request values gathered by middleware. `fields` is a free-form bag
/// carried into `operation_end`; values are masked on insert.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub domain: &'static str,
    pub caller: Option<CallerIdentity>,
    pub client_ip: String,
    pub fields: Details,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            domain: DOMAIN_ACCOUNT,
            caller: None,
            client_ip: "unknown".to_string(),
            fields: Details::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set_field(key, value);
        self
    }

    pub fn set_field(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), mask_field(key, value.into()));
    }

    pub fn with_caller(mut self, caller: CallerIdentity) -> Self {
        self.caller = Some(caller);
        self
    }

    /// The authenticated caller. Absence inside a handler that needs one is
    /// an authentication failure and a security event.
    pub fn caller(&self) -> Result<&CallerIdentity, AccountError> {
        self.caller.as_ref().ok_or_else(|| {
            logging::security_event(
                "unauthorized_context_access",
                Severity::Medium,
                "caller identity missing from request context",
            );
            AccountError::authentication(self.domain, "missing_user_context")
        })
    }

    pub fn user_id(&self) -> Result<i64, AccountError> {
        self.caller().map(|c| c.user_id)
    }

    /// Context forwarded to backend calls.
    pub fn call_context(&self) -> CallContext {
        CallContext::new(self.request_id.clone())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .extensions
            .get::<RequestId>()
            .map(|id| id.0.clone())
            .or_else(|| {
                parts
                    .headers
                    .get(REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            })
            .unwrap_or_default();
        let domain = parts
            .extensions
            .get::<DomainTag>()
            .map_or(DOMAIN_ACCOUNT, |d| d.0);
        let caller = parts.extensions.get::<CallerIdentity>().cloned();
        let client_ip = match parts.extensions.get::<ClientIp>() {
            Some(ip) => ip.0.clone(),
            None => {
                let peer = parts.extensions.get::<ConnectInfo<SocketAddr>>().map(|c| c.0);
                client_ip(&parts.headers, peer, false)
            }
        };
        let mut ctx = Self {
            request_id,
            domain,
            caller,
            client_ip,
            fields: Details::new(),
        };
        let ip = ctx.client_ip.clone();
        ctx.set_field("client_ip", ip);
        Ok(ctx)
    }
}

// ---------------------------------------------------------------------------
// JSON bodies
// ---------------------------------------------------------------------------

/// A request body type with a known, closed set of field names.
pub trait JsonBody: DeserializeOwned {
    const FIELDS: &'static [&'static str];
}

/// Per-operation decoding options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    pub max_bytes: usize,
    pub deny_unknown_fields: bool,
    /// Treat an empty body as `{}` instead of `body_missing`.
    pub allow_empty: bool,
}

impl DecodeOptions {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            deny_unknown_fields: true,
            allow_empty: false,
        }
    }

    pub fn allow_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }

    pub fn allow_unknown_fields(mut self) -> Self {
        self.deny_unknown_fields = false;
        self
    }
}

fn body_error(code: &'static str, message: impl Into<String>) -> AccountError {
    AccountError::validation(DOMAIN_ACCOUNT, "body", message).with_code(code)
}

/// Buffer at most `max_bytes` of `body`.
pub async fn read_body(body: Body, max_bytes: usize) -> Result<Bytes, AccountError> {
    axum::body::to_bytes(body, max_bytes).await.map_err(|err| {
        let too_large = err
            .into_inner()
            .downcast_ref::<http_body_util::LengthLimitError>()
            .is_some();
        if too_large {
            body_error("body_too_large", format!("request body must not exceed {max_bytes} bytes"))
                .with_detail("max_bytes", max_bytes)
        } else {
            body_error("body_unreadable", "request body could not be read")
        }
    })
}

/// Decode `bytes` as `T`. Parser messages are never surfaced because they
/// can quote input values; only positions and field names are reported.
pub fn decode_json<T: JsonBody>(bytes: &[u8], options: DecodeOptions) -> Result<T, AccountError> {
    if bytes.len() > options.max_bytes {
        return Err(body_error(
            "body_too_large",
            format!("request body must not exceed {} bytes", options.max_bytes),
        )
        .with_detail("max_bytes", options.max_bytes));
    }
    let blank = bytes.iter().all(u8::is_ascii_whitespace);
    let bytes: &[u8] = match (blank, options.allow_empty) {
        (true, true) => b"{}",
        (true, false) => return Err(body_error("body_missing", "request body is required")),
        (false, _) => bytes,
    };

    let value: Value = serde_json::from_slice(bytes).map_err(|err| {
        body_error("json_decode", "request body is not valid JSON")
            .with_detail("line", err.line())
            .with_detail("column", err.column())
    })?;
    let Value::Object(map) = &value else {
        return Err(body_error("json_decode", "request body must be a JSON object"));
    };
    if options.deny_unknown_fields {
        let mut unknown: Vec<&str> = map
            .keys()
            .map(String::as_str)
            .filter(|k| !T::FIELDS.contains(k))
            .collect();
        if !unknown.is_empty() {
            unknown.sort_unstable();
            return Err(body_error("unknown_field", format!("unknown field: {}", unknown.join(", ")))
                .with_detail("unknown_fields", unknown));
        }
    }
    serde_json::from_value(value).map_err(|err| {
        let message = match err.classify() {
            serde_json::error::Category::Data => "request body has a missing or mistyped field",
            _ => "request body is not valid JSON",
        };
        body_error("json_decode", message)
    })
}

/// [`read_body`] followed by [`decode_json`].
pub async fn decode_body<T: JsonBody>(body: Body, options: DecodeOptions) -> Result<T, AccountError> {
    let bytes = read_body(body, options.max_bytes).await?;
    decode_json(&bytes, options)
}

// ---------------------------------------------------------------------------
// Path parameters
// ---------------------------------------------------------------------------

/// Raw single-segment path parameter; extraction failures become
/// `invalid_<name>`.
pub fn path_param(name: &str, raw: Result<Path<String>, PathRejection>) -> Result<String, AccountError> {
    raw.map(|Path(value)| value).map_err(|_| {
        AccountError::validation(DOMAIN_ACCOUNT, name, format!("{name} is not a valid path parameter"))
            .with_code(format!("invalid_{name}"))
    })
}

/// [`path_param`] followed by [`parse_int_id`].
pub fn path_id(name: &str, raw: Result<Path<String>, PathRejection>) -> Result<i64, AccountError> {
    parse_int_id(name, &path_param(name, raw)?)
}

/// Strictly positive 64-bit id. Failure code is `invalid_<name>`.
pub fn parse_int_id(name: &str, raw: &str) -> Result<i64, AccountError> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AccountError::validation(DOMAIN_ACCOUNT, name, format!("{name} must be a positive integer"))
            .with_code(format!("invalid_{name}"))),
    }
}

/// Trimmed string with a character count in `min..=max`.
pub fn parse_string(name: &str, raw: &str, min: usize, max: usize) -> Result<String, AccountError> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if len < min || len > max {
        return Err(AccountError::validation(
            DOMAIN_ACCOUNT,
            name,
            format!("{name} must be between {min} and {max} characters"),
        )
        .with_code(format!("invalid_{name}")));
    }
    Ok(trimmed.to_string())
}

// ---------------------------------------------------------------------------
// Query string
// ---------------------------------------------------------------------------

/// Decode a raw query string. Later duplicates win.
pub fn query_map(raw: Option<&str>) -> HashMap<String, String> {
    raw.map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub order: SortOrder,
}

fn collect_pagination(query: &HashMap<String, String>, errors: &mut ErrorCollection) -> Pagination {
    let mut pagination = Pagination::default();
    if let Some(raw) = query.get("page").filter(|v| !v.is_empty()) {
        match raw.parse::<u32>() {
            Ok(page) if page >= 1 => pagination.page = page,
            _ => errors.add("page", "invalid_page", "page must be an integer of at least 1"),
        }
    }
    if let Some(raw) = query.get("page_size").filter(|v| !v.is_empty()) {
        match raw.parse::<u32>() {
            Ok(size) if (1..=MAX_PAGE_SIZE).contains(&size) => pagination.page_size = size,
            _ => errors.add(
                "page_size",
                "invalid_page_size",
                format!("page_size must be an integer between 1 and {MAX_PAGE_SIZE}"),
            ),
        }
    }
    pagination
}

fn collect_sort(
    query: &HashMap<String, String>,
    allowed: &[&str],
    default_field: &str,
    errors: &mut ErrorCollection,
) -> Sort {
    let mut sort = Sort {
        field: default_field.to_string(),
        order: SortOrder::Desc,
    };
    if let Some(raw) = query.get("sort_by").filter(|v| !v.is_empty()) {
        if allowed.contains(&raw.as_str()) {
            sort.field = raw.clone();
        } else {
            errors.add(
                "sort_by",
                "invalid_sort_by",
                format!("sort_by must be one of: {}", allowed.join(", ")),
            );
        }
    }
    if let Some(raw) = query.get("sort_order").filter(|v| !v.is_empty()) {
        match raw.parse::<SortOrder>() {
            Ok(order) => sort.order = order,
            Err(_) => errors.add("sort_order", "invalid_sort_order", "sort_order must be one of: asc, desc"),
        }
    }
    sort
}

/// `page` and `page_size` with defaults 1 and 10. Every failing parameter
/// contributes to one composite validation error.
pub fn parse_pagination(query: &HashMap<String, String>) -> Result<Pagination, AccountError> {
    let mut errors = ErrorCollection::new(DOMAIN_ACCOUNT);
    let pagination = collect_pagination(query, &mut errors);
    errors.into_result().map(|()| pagination)
}

/// `sort_by` restricted to `allowed`, `sort_order` defaulting to `desc`.
pub fn parse_sort(query: &HashMap<String, String>, allowed: &[&str], default_field: &str) -> Result<Sort, AccountError> {
    let mut errors = ErrorCollection::new(DOMAIN_ACCOUNT);
    let sort = collect_sort(query, allowed, default_field, &mut errors);
    errors.into_result().map(|()| sort)
}

/// Pagination and sort together, reporting all failures at once.
pub fn parse_page_request(
    query: &HashMap<String, String>,
    allowed: &[&str],
    default_field: &str,
) -> Result<PageRequest, AccountError> {
    let mut errors = ErrorCollection::new(DOMAIN_ACCOUNT);
    let pagination = collect_pagination(query, &mut errors);
    let sort = collect_sort(query, allowed, default_field, &mut errors);
    errors.into_result()?;
    Ok(PageRequest {
        page: pagination.page,
        page_size: pagination.page_size,
        sort_by: sort.field,
        sort_order: sort.order,
    })
}

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Client address: first `X-Forwarded-For` hop when trusted, then
/// `X-Real-IP`, then the peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let first_hop = header_str(headers, "x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = first_hop {
            return ip.to_string();
        }
    }
    if let Some(ip) = header_str(headers, "x-real-ip") {
        return ip.to_string();
    }
    peer.map_or_else(|| "unknown".to_string(), |addr| addr.ip().to_string())
}

/// Token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<Secret, AccountError> {
    let Some(raw) = headers.get(header::AUTHORIZATION) else {
        return Err(AccountError::authentication(DOMAIN_ACCOUNT, "missing_auth_header")
            .with_code("missing_auth_header")
            .with_message("authorization header is required"));
    };
    let malformed = || {
        AccountError::authentication(DOMAIN_ACCOUNT, "invalid_auth_header_format")
            .with_code("invalid_auth_header_format")
            .with_message("authorization header must use the Bearer scheme")
    };
    let raw = raw.to_str().map_err(|_| malformed())?;
    let (scheme, token) = raw.trim().split_once(' ').ok_or_else(malformed)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() || token.contains(' ') {
        return Err(malformed());
    }
    Ok(Secret::new(token))
}

/// Optional `Idempotency-Key`: 1 to 255 visible ASCII characters.
pub fn idempotency_key(headers: &HeaderMap) -> Result<Option<String>, AccountError> {
    let Some(raw) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(None);
    };
    let valid = raw
        .to_str()
        .ok()
        .filter(|k| (1..=255).contains(&k.len()) && k.bytes().all(|b| b.is_ascii_graphic()));
    match valid {
        Some(key) => Ok(Some(key.to_string())),
        None => Err(AccountError::validation(
            DOMAIN_ACCOUNT,
            IDEMPOTENCY_KEY_HEADER,
            "Idempotency-Key must be 1 to 255 visible ASCII characters",
        )
        .with_code("invalid_idempotency_key")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use proptest::prelude::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        name: String,
        #[serde(default)]
        age: Option<u32>,
    }

    impl JsonBody for Sample {
        const FIELDS: &'static [&'static str] = &["name", "age"];
    }

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn decodes_known_fields() {
        let sample: Sample = decode_json(br#"{"name":"Ada","age":36}"#, DecodeOptions::new(1024)).unwrap();
        assert_eq!(sample.name, "Ada");
        assert_eq!(sample.age, Some(36));
    }

    #[test]
    fn empty_body_is_body_missing() {
        let err = decode_json::<Sample>(b"  ", DecodeOptions::new(1024)).unwrap_err();
        assert_eq!(err.code(), "body_missing");
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn empty_body_allowed_when_requested() {
        #[derive(Debug, Deserialize, Default)]
        struct Optional {
            #[serde(default)]
            note: Option<String>,
        }
        impl JsonBody for Optional {
            const FIELDS: &'static [&'static str] = &["note"];
        }
        let decoded: Optional = decode_json(b"", DecodeOptions::new(1024).allow_empty()).unwrap();
        assert!(decoded.note.is_none());
    }

    #[test]
    fn malformed_json_reports_position() {
        let err = decode_json::<Sample>(b"{\n  \"name\": ", DecodeOptions::new(1024)).unwrap_err();
        assert_eq!(err.code(), "json_decode");
        assert_eq!(err.details()["line"], 2);
        assert!(err.details().contains_key("column"));
    }

    #[test]
    fn unknown_fields_rejected_by_default() {
        let err = decode_json::<Sample>(br#"{"name":"Ada","is_admin":true}"#, DecodeOptions::new(1024)).unwrap_err();
        assert_eq!(err.code(), "unknown_field");
        assert!(err.message().contains("is_admin"));

        let ok = decode_json::<Sample>(
            br#"{"name":"Ada","is_admin":true}"#,
            DecodeOptions::new(1024).allow_unknown_fields(),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn type_errors_do_not_echo_values() {
        let err = decode_json::<Sample>(br#"{"name":"hunter2-secret","age":"old"}"#, DecodeOptions::new(1024))
            .unwrap_err();
        assert_eq!(err.code(), "json_decode");
        assert!(!err.message().contains("old"));
    }

    #[test]
    fn oversized_body_rejected() {
        let err = decode_json::<Sample>(br#"{"name":"Ada"}"#, DecodeOptions::new(4)).unwrap_err();
        assert_eq!(err.code(), "body_too_large");
    }

    #[tokio::test]
    async fn read_body_enforces_cap() {
        let err = read_body(Body::from(vec![b'x'; 64]), 16).await.unwrap_err();
        assert_eq!(err.code(), "body_too_large");
        let bytes = read_body(Body::from("{}"), 16).await.unwrap();
        assert_eq!(&bytes[..], b"{}");
    }

    #[test]
    fn int_id_must_be_positive() {
        assert_eq!(parse_int_id("id", "42").unwrap(), 42);
        for bad in ["0", "-3", "abc", "", "9223372036854775808"] {
            let err = parse_int_id("id", bad).unwrap_err();
            assert_eq!(err.code(), "invalid_id", "{bad}");
        }
    }

    #[test]
    fn string_param_is_trimmed_and_bounded() {
        assert_eq!(parse_string("token", "  abc  ", 1, 5).unwrap(), "abc");
        assert_eq!(parse_string("token", "   ", 1, 5).unwrap_err().code(), "invalid_token");
        assert!(parse_string("token", "abcdef", 1, 5).is_err());
    }

    #[test]
    fn pagination_defaults() {
        let p = parse_pagination(&HashMap::new()).unwrap();
        assert_eq!(p, Pagination { page: 1, page_size: 10 });
    }

    #[test]
    fn both_bad_pagination_params_reported_together() {
        let err = parse_pagination(&query(&[("page", "0"), ("page_size", "500")])).unwrap_err();
        assert_eq!(err.code(), "validation_failed");
        assert!(err.details().contains_key("page"));
        assert!(err.details().contains_key("page_size"));
    }

    #[test]
    fn sort_rejects_unknown_field_listing_allowed() {
        let err = parse_sort(&query(&[("sort_by", "ssn")]), &["name", "email"], "name").unwrap_err();
        assert_eq!(err.code(), "invalid_sort_by");
        assert_eq!(err.details()["sort_by"], "sort_by must be one of: name, email");
    }

    #[test]
    fn sort_order_defaults_to_desc() {
        let sort = parse_sort(&HashMap::new(), &["name"], "name").unwrap();
        assert_eq!(sort.order, SortOrder::Desc);
        let err = parse_sort(&query(&[("sort_order", "sideways")]), &["name"], "name").unwrap_err();
        assert_eq!(err.code(), "invalid_sort_order");
    }

    #[test]
    fn query_map_decodes_percent_escapes() {
        let map = query_map(Some("q=ada%20l&role=admin"));
        assert_eq!(map["q"], "ada l");
        assert_eq!(map["role"], "admin");
    }

    #[test]
    fn client_ip_precedence() {
        let peer: SocketAddr = "10.0.0.9:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(peer), true), "10.0.0.9");
        headers.insert("x-real-ip", HeaderValue::from_static("192.0.2.7"));
        assert_eq!(client_ip(&headers, Some(peer), true), "192.0.2.7");
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.5, 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some(peer), true), "203.0.113.5");
        assert_eq!(client_ip(&headers, Some(peer), false), "192.0.2.7");
        assert_eq!(client_ip(&HeaderMap::new(), None, false), "unknown");
    }

    #[test]
    fn bearer_token_codes() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers).unwrap_err().code(), "missing_auth_header");
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("NotBearer xxx"));
        assert_eq!(bearer_token(&headers).unwrap_err().code(), "invalid_auth_header_format");
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer"));
        assert_eq!(bearer_token(&headers).unwrap_err().code(), "invalid_auth_header_format");
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer abc.def"));
        assert_eq!(bearer_token(&headers).unwrap().expose(), "abc.def");
    }

    #[test]
    fn idempotency_key_bounds() {
        let mut headers = HeaderMap::new();
        assert_eq!(idempotency_key(&headers).unwrap(), None);
        headers.insert(IDEMPOTENCY_KEY_HEADER, HeaderValue::from_static("reg-0001"));
        assert_eq!(idempotency_key(&headers).unwrap().as_deref(), Some("reg-0001"));
        headers.insert(IDEMPOTENCY_KEY_HEADER, HeaderValue::from_static("has space"));
        assert_eq!(idempotency_key(&headers).unwrap_err().code(), "invalid_idempotency_key");
    }

    proptest! {
        #[test]
        fn page_size_outside_bounds_is_rejected(size in prop_oneof![Just(0i64), 101i64..10_000, -10_000i64..0]) {
            let q = query(&[("page_size", &size.to_string())]);
            let err = parse_pagination(&q).unwrap_err();
            prop_assert_eq!(err.http_status(), 400);
        }

        #[test]
        fn page_size_inside_bounds_is_kept(size in 1u32..=100, page in 1u32..10_000) {
            let q = query(&[("page", &page.to_string()), ("page_size", &size.to_string())]);
            let p = parse_pagination(&q).unwrap();
            prop_assert_eq!(p, Pagination { page, page_size: size });
        }
    }
}
