//! # Response Envelopes
//!
//! Uniform JSON shapes for every response body:
//!
//! - success: `{ "success": true, "request_id": "...", "data": ... }`
//! - error: `{ "success": false, "request_id": "...", "error": { code, message, kind, domain, details? } }`
//!
//! Rendering reads only the client-safe parts of an [`AccountError`]; the
//! cause chain, layer, and operation stay in the logs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AccountError, Details, ErrorKind};

/// Success envelope wrapping `data`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SuccessEnvelope<T> {
    pub success: bool,
    pub request_id: String,
    pub data: T,
}

impl<T> SuccessEnvelope<T> {
    pub fn new(request_id: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            request_id: request_id.into(),
            data,
        }
    }
}

/// Client-visible error fields.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub kind: ErrorKind,
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<Details>,
}

/// Error envelope.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub request_id: String,
    pub error: ErrorBody,
}

impl ErrorEnvelope {
    /// Render `err`. Server-side errors keep their generic message; details
    /// are taken as already masked.
    pub fn from_error(request_id: impl Into<String>, err: &AccountError) -> Self {
        let details = if err.details().is_empty() {
            None
        } else {
            Some(err.details().clone())
        };
        Self {
            success: false,
            request_id: request_id.into(),
            error: ErrorBody {
                code: err.code().to_string(),
                message: err.message().to_string(),
                kind: err.kind(),
                domain: err.domain().to_string(),
                details,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DOMAIN_ACCOUNT;

    #[test]
    fn error_envelope_shape() {
        let err = AccountError::conflict(DOMAIN_ACCOUNT, "user", "email", "a@b.co")
            .with_detail("suggestion", "try logging in instead")
            .with_cause(std::io::Error::new(std::io::ErrorKind::Other, "row 42 exists"));
        let json = serde_json::to_value(ErrorEnvelope::from_error("req-1", &err)).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["request_id"], "req-1");
        assert_eq!(json["error"]["code"], "duplicate_email");
        assert_eq!(json["error"]["kind"], "conflict");
        assert_eq!(json["error"]["domain"], "account");
        assert_eq!(json["error"]["details"]["suggestion"], "try logging in instead");
        assert!(!json.to_string().contains("row 42"));
    }

    #[test]
    fn empty_details_are_omitted() {
        let err = AccountError::new(ErrorKind::System, "internal_error", "an internal error occurred");
        let json = serde_json::to_value(ErrorEnvelope::from_error("r", &err)).unwrap();
        assert!(json["error"].get("details").is_none());
    }

    #[test]
    fn success_envelope_shape() {
        let json = serde_json::to_value(SuccessEnvelope::new("r", serde_json::json!({"id": 1}))).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["id"], 1);
    }
}
