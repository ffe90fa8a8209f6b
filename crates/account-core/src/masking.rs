//! # Sensitive Value Masking
//!
//! Helpers applied wherever a log field map or an error `details` map is
//! built. Masking happens at construction time so no unmasked value can
//! reach a sink through a side path.
//!
//! ## Rules
//!
//! - Any key containing `password`, `token` or `secret` (case-insensitive)
//!   has its value replaced by [`MASK`]. This covers `new_password`,
//!   `current_password`, `refresh_token`, `jwt_secret` and friends.
//! - Any key containing `email` whose value is a string is reduced to the
//!   first and last character of the local part plus the full domain.
//! - Objects and arrays are walked recursively.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Replacement text for masked values.
pub const MASK: &str = "[MASKED]";

const SENSITIVE_MARKERS: [&str; 3] = ["password", "token", "secret"];

/// Returns `true` if values stored under `key` must never be emitted.
pub fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_MARKERS.iter().any(|marker| key.contains(marker))
}

fn is_email_key(key: &str) -> bool {
    key.to_ascii_lowercase().contains("email")
}

/// Mask an email address, keeping the first and last character of the
/// local part and the domain: `alice@example.com` becomes `a***e@example.com`.
///
/// Inputs without an `@` are masked completely.
pub fn mask_email(email: &str) -> String {
    let Some((local, domain)) = email.rsplit_once('@') else {
        return MASK.to_string();
    };
    let mut chars = local.chars();
    match (chars.next(), chars.next_back()) {
        (Some(first), Some(last)) => format!("{first}***{last}@{domain}"),
        (Some(first), None) => format!("{first}***@{domain}"),
        _ => format!("***@{domain}"),
    }
}

/// Mask a single value according to the key it is stored under.
pub fn mask_field(key: &str, value: Value) -> Value {
    if is_sensitive_key(key) {
        return match value {
            Value::Null => Value::Null,
            _ => Value::String(MASK.to_string()),
        };
    }
    match value {
        Value::String(s) if is_email_key(key) => Value::String(mask_email(&s)),
        Value::Object(map) => Value::Object(mask_map(map)),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| mask_field(key, v)).collect())
        }
        other => other,
    }
}

/// Mask every entry of a field map.
pub fn mask_map(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .map(|(k, v)| {
            let masked = mask_field(&k, v);
            (k, masked)
        })
        .collect()
}

/// Short, non-reversible fingerprint of a token for correlating log lines
/// without emitting the token itself.
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest
        .iter()
        .take(6)
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Credential material (passwords, tokens) carried through request and
/// RPC types. `Debug` never prints the value and the buffer is zeroed on
/// drop; serialization emits the raw value for the wire only.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(Zeroizing<String>);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Borrow the raw value.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({MASK})")
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose())
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Secret::new)
    }
}
