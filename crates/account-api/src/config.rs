//! # Service Configuration
//!
//! [`AccountConfig`] is loaded once at startup from an optional YAML file,
//! then overridden field by field from `ACCOUNT_*` environment variables,
//! then validated. Every field has a default, so an empty file (or none)
//! yields a working development configuration.
//!
//! | Variable | Field |
//! |---|---|
//! | `ACCOUNT_ENVIRONMENT` | `environment` |
//! | `ACCOUNT_BIND_ADDR` | `bind_addr` |
//! | `ACCOUNT_BACKEND_URL` | `backend_url` |
//! | `ACCOUNT_MAX_LOGIN_ATTEMPTS` | `max_login_attempts` |
//! | `ACCOUNT_LOCKOUT_SECS` | `lockout_secs` |
//! | `ACCOUNT_SESSION_TIMEOUT_SECS` | `session_timeout_secs` |
//! | `ACCOUNT_PASSWORD_MIN_LENGTH` | `password.min_length` |
//! | `ACCOUNT_PASSWORD_REQUIRE_COMPLEXITY` | `password.require_complexity` |
//! | `ACCOUNT_EMAIL_VERIFICATION_REQUIRED` | `email_verification_required` |
//! | `ACCOUNT_ALLOWED_EMAIL_DOMAINS` | `allowed_email_domains` (comma separated) |
//! | `ACCOUNT_BUSINESS_EMAIL_REQUIRED` | `business_email_required` |
//! | `ACCOUNT_ALLOWED_ORIGINS` | `allowed_origins` (comma separated) |
//! | `ACCOUNT_RATE_LIMIT_ENABLED` | `rate_limit.enabled` |
//! | `ACCOUNT_RATE_LIMIT_PER_MINUTE` | `rate_limit.requests_per_minute` |
//! | `ACCOUNT_BODY_LIMIT_BYTES` | `body_limit_bytes` |
//! | `ACCOUNT_TRUST_FORWARDED_FOR` | `trust_forwarded_for` |
//! | `ACCOUNT_JWT_SECRET` | `jwt_secret` |
//! | `ACCOUNT_LOG_FORMAT` | `log_format` (`json` or `pretty`) |

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use account_core::Secret;
use serde::Deserialize;
use thiserror::Error;

/// Default request body cap: 1 MiB.
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Configuration loading or validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },

    #[error("invalid configuration: {field} {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            _ => Err(()),
        }
    }
}

/// Password policy applied by the `strongpassword` rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PasswordPolicy {
    pub require_complexity: bool,
    pub min_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            require_complexity: true,
            min_length: 8,
        }
    }
}

/// Per-client request budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub requests_per_minute: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 60,
        }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccountConfig {
    pub environment: String,
    pub bind_addr: String,
    /// Base URL of the account backend. Required by the binary.
    pub backend_url: Option<String>,
    pub max_login_attempts: u32,
    pub lockout_secs: u64,
    pub session_timeout_secs: u64,
    pub password: PasswordPolicy,
    pub email_verification_required: bool,
    /// Registration is restricted to these domains when non-empty.
    pub allowed_email_domains: Vec<String>,
    /// Reject free-mail providers at registration.
    pub business_email_required: bool,
    pub allowed_origins: Vec<String>,
    pub rate_limit: RateLimitSettings,
    pub body_limit_bytes: usize,
    /// Honor `X-Forwarded-For` when resolving the client address.
    pub trust_forwarded_for: bool,
    /// Token signing secret. Redacted in `Debug`, never logged.
    pub jwt_secret: Option<Secret>,
    pub log_format: LogFormat,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            bind_addr: "0.0.0.0:8080".to_string(),
            backend_url: None,
            max_login_attempts: 5,
            lockout_secs: 15 * 60,
            session_timeout_secs: 24 * 60 * 60,
            password: PasswordPolicy::default(),
            email_verification_required: false,
            allowed_email_domains: Vec::new(),
            business_email_required: false,
            allowed_origins: Vec::new(),
            rate_limit: RateLimitSettings::default(),
            body_limit_bytes: DEFAULT_BODY_LIMIT,
            trust_forwarded_for: false,
            jwt_secret: None,
            log_format: LogFormat::Json,
        }
    }
}

impl AccountConfig {
    /// Load from `path` (if any) and the process environment, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.with_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment overrides read through `lookup`.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ACCOUNT_ENVIRONMENT") {
            self.environment = v;
        }
        if let Some(v) = lookup("ACCOUNT_BIND_ADDR") {
            self.bind_addr = v;
        }
        if let Some(v) = lookup("ACCOUNT_BACKEND_URL") {
            self.backend_url = Some(v);
        }
        if let Some(v) = lookup("ACCOUNT_MAX_LOGIN_ATTEMPTS") {
            self.max_login_attempts = parse_var("ACCOUNT_MAX_LOGIN_ATTEMPTS", v)?;
        }
        if let Some(v) = lookup("ACCOUNT_LOCKOUT_SECS") {
            self.lockout_secs = parse_var("ACCOUNT_LOCKOUT_SECS", v)?;
        }
        if let Some(v) = lookup("ACCOUNT_SESSION_TIMEOUT_SECS") {
            self.session_timeout_secs = parse_var("ACCOUNT_SESSION_TIMEOUT_SECS", v)?;
        }
        if let Some(v) = lookup("ACCOUNT_PASSWORD_MIN_LENGTH") {
            self.password.min_length = parse_var("ACCOUNT_PASSWORD_MIN_LENGTH", v)?;
        }
        if let Some(v) = lookup("ACCOUNT_PASSWORD_REQUIRE_COMPLEXITY") {
            self.password.require_complexity = parse_var("ACCOUNT_PASSWORD_REQUIRE_COMPLEXITY", v)?;
        }
        if let Some(v) = lookup("ACCOUNT_EMAIL_VERIFICATION_REQUIRED") {
            self.email_verification_required = parse_var("ACCOUNT_EMAIL_VERIFICATION_REQUIRED", v)?;
        }
        if let Some(v) = lookup("ACCOUNT_ALLOWED_EMAIL_DOMAINS") {
            self.allowed_email_domains = split_list(&v);
        }
        if let Some(v) = lookup("ACCOUNT_BUSINESS_EMAIL_REQUIRED") {
            self.business_email_required = parse_var("ACCOUNT_BUSINESS_EMAIL_REQUIRED", v)?;
        }
        if let Some(v) = lookup("ACCOUNT_ALLOWED_ORIGINS") {
            self.allowed_origins = split_list(&v);
        }
        if let Some(v) = lookup("ACCOUNT_RATE_LIMIT_ENABLED") {
            self.rate_limit.enabled = parse_var("ACCOUNT_RATE_LIMIT_ENABLED", v)?;
        }
        if let Some(v) = lookup("ACCOUNT_RATE_LIMIT_PER_MINUTE") {
            self.rate_limit.requests_per_minute = parse_var("ACCOUNT_RATE_LIMIT_PER_MINUTE", v)?;
        }
        if let Some(v) = lookup("ACCOUNT_BODY_LIMIT_BYTES") {
            self.body_limit_bytes = parse_var("ACCOUNT_BODY_LIMIT_BYTES", v)?;
        }
        if let Some(v) = lookup("ACCOUNT_TRUST_FORWARDED_FOR") {
            self.trust_forwarded_for = parse_var("ACCOUNT_TRUST_FORWARDED_FOR", v)?;
        }
        if let Some(v) = lookup("ACCOUNT_JWT_SECRET") {
            self.jwt_secret = Some(Secret::new(v));
        }
        if let Some(v) = lookup("ACCOUNT_LOG_FORMAT") {
            self.log_format = v.parse().map_err(|_| ConfigError::Env {
                var: "ACCOUNT_LOG_FORMAT",
                value: v,
            })?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_addr.parse::<SocketAddr>().is_err() {
            return Err(invalid("bind_addr", format!("is not a socket address: {}", self.bind_addr)));
        }
        if self.max_login_attempts == 0 {
            return Err(invalid("max_login_attempts", "must be at least 1"));
        }
        if self.password.min_length == 0 {
            return Err(invalid("password.min_length", "must be at least 1"));
        }
        if self.body_limit_bytes == 0 {
            return Err(invalid("body_limit_bytes", "must be positive"));
        }
        if self.rate_limit.enabled && self.rate_limit.requests_per_minute == 0 {
            return Err(invalid("rate_limit.requests_per_minute", "must be positive when enabled"));
        }
        if let Some(url) = &self.backend_url {
            if url::Url::parse(url).is_err() {
                return Err(invalid("backend_url", format!("is not a URL: {url}")));
            }
        }
        Ok(())
    }

    pub fn lockout(&self) -> Duration {
        Duration::from_secs(self.lockout_secs)
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn parse_var<T: FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env { var, value })
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = AccountConfig::default();
        config.validate().unwrap();
        assert_eq!(config.max_login_attempts, 5);
        assert_eq!(config.body_limit_bytes, 1024 * 1024);
        assert!(!config.business_email_required);
        assert!(config.allowed_email_domains.is_empty());
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "environment: staging\nmax_login_attempts: 3\npassword:\n  min_length: 12\nallowed_email_domains: [example.com]\njwt_secret: s3cret-value"
        )
        .unwrap();
        let config = AccountConfig::from_file(file.path()).unwrap();
        assert_eq!(config.environment, "staging");
        assert_eq!(config.max_login_attempts, 3);
        assert_eq!(config.password.min_length, 12);
        assert!(config.password.require_complexity);
        assert_eq!(config.allowed_email_domains, vec!["example.com"]);
        assert!(!format!("{config:?}").contains("s3cret-value"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_login_attempt: 3").unwrap();
        assert!(matches!(
            AccountConfig::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = AccountConfig::from_file(Path::new("/nonexistent/account.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let config = AccountConfig::default()
            .with_env(env(&[
                ("ACCOUNT_MAX_LOGIN_ATTEMPTS", "7"),
                ("ACCOUNT_ALLOWED_EMAIL_DOMAINS", "a.com, b.org ,"),
                ("ACCOUNT_RATE_LIMIT_ENABLED", "false"),
                ("ACCOUNT_LOG_FORMAT", "pretty"),
            ]))
            .unwrap();
        assert_eq!(config.max_login_attempts, 7);
        assert_eq!(config.allowed_email_domains, vec!["a.com", "b.org"]);
        assert!(!config.rate_limit.enabled);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn bad_env_value_names_the_variable() {
        let err = AccountConfig::default()
            .with_env(env(&[("ACCOUNT_MAX_LOGIN_ATTEMPTS", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("ACCOUNT_MAX_LOGIN_ATTEMPTS"));
    }

    #[test]
    fn validation_rejects_nonsense() {
        let config = AccountConfig {
            max_login_attempts: 0,
            ..AccountConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AccountConfig {
            backend_url: Some("not a url".into()),
            ..AccountConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
