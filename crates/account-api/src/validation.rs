//! # Validation Engine
//!
//! Request bodies describe their checks as tag lists, one per field, in the
//! style of struct tags:
//!
//! ```text
//! name      required,min=2,max=100
//! email     required,email,max=254
//! password  required,strongpassword
//! role      userrole
//! ```
//!
//! A type opts in by implementing [`Validate`]. The [`Validator`] walks the
//! fields, stops at the first failing rule of each field, and folds every
//! failure into one composite validation error (400) keyed by field name.
//!
//! Built-in tags: `required`, `email`, `min=N`, `max=N`, `len=N`,
//! `oneof=a b c`, `url`. Account tags: `strongpassword`, `userrole`,
//! `uniqueemail`. A field that is absent or empty and not `required` skips
//! its remaining rules.

use account_client::{AccountBackend, CallContext};
use account_core::{AccountError, ErrorCollection, FieldViolation, Role, DOMAIN_ACCOUNT};
use serde_json::Value;

use crate::config::PasswordPolicy;
use crate::logging;

/// Characters accepted as the special class of a strong password.
pub const PASSWORD_SPECIALS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

const MAX_EMAIL_LEN: usize = 254;

/// One parsed validation tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Required,
    Email,
    Min(usize),
    Max(usize),
    Len(usize),
    OneOf(Vec<String>),
    Url,
    StrongPassword,
    UserRole,
    UniqueEmail,
}

impl Rule {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Email => "email",
            Self::Min(_) => "min",
            Self::Max(_) => "max",
            Self::Len(_) => "len",
            Self::OneOf(_) => "oneof",
            Self::Url => "url",
            Self::StrongPassword => "strongpassword",
            Self::UserRole => "userrole",
            Self::UniqueEmail => "uniqueemail",
        }
    }

    /// Parse a comma-separated tag list.
    pub fn parse_tags(tags: &str) -> Result<Vec<Rule>, String> {
        tags.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(Rule::parse)
            .collect()
    }

    fn parse(tag: &str) -> Result<Rule, String> {
        let (name, arg) = match tag.split_once('=') {
            Some((name, arg)) => (name, Some(arg)),
            None => (tag, None),
        };
        let number = |arg: Option<&str>| {
            arg.and_then(|a| a.parse::<usize>().ok())
                .ok_or_else(|| format!("tag {name} needs a numeric argument"))
        };
        Ok(match name {
            "required" => Rule::Required,
            "email" => Rule::Email,
            "min" => Rule::Min(number(arg)?),
            "max" => Rule::Max(number(arg)?),
            "len" => Rule::Len(number(arg)?),
            "oneof" => {
                let options: Vec<String> = arg.unwrap_or_default().split_whitespace().map(str::to_string).collect();
                if options.is_empty() {
                    return Err("tag oneof needs at least one option".to_string());
                }
                Rule::OneOf(options)
            }
            "url" => Rule::Url,
            "strongpassword" => Rule::StrongPassword,
            "userrole" => Rule::UserRole,
            "uniqueemail" => Rule::UniqueEmail,
            other => return Err(format!("unknown validation tag {other}")),
        })
    }
}

/// A field to check: its name, its value if present, and its tags.
#[derive(Debug, Clone)]
pub struct Field<'a> {
    pub name: &'static str,
    pub value: Option<&'a str>,
    pub tags: &'static str,
    /// Account id whose own email does not count as a duplicate.
    pub owner: Option<i64>,
}

impl<'a> Field<'a> {
    pub fn new(name: &'static str, value: &'a str, tags: &'static str) -> Self {
        Self {
            name,
            value: Some(value),
            tags,
            owner: None,
        }
    }

    pub fn optional(name: &'static str, value: Option<&'a str>, tags: &'static str) -> Self {
        Self {
            name,
            value,
            tags,
            owner: None,
        }
    }

    pub fn owned_by(mut self, id: i64) -> Self {
        self.owner = Some(id);
        self
    }
}

/// Types with declared field checks.
pub trait Validate {
    fn fields(&self) -> Vec<Field<'_>>;
}

/// Syntactic email check: one `@`, a non-empty local part, a dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LEN || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

/// Domain part of an email, lowercased.
pub fn email_domain(email: &str) -> Option<String> {
    email.rsplit_once('@').map(|(_, d)| d.to_ascii_lowercase())
}

fn is_strong_password(value: &str, policy: &PasswordPolicy) -> bool {
    if value.chars().count() < policy.min_length {
        return false;
    }
    if !policy.require_complexity {
        return true;
    }
    value.chars().any(|c| c.is_ascii_uppercase())
        && value.chars().any(|c| c.is_ascii_lowercase())
        && value.chars().any(|c| c.is_ascii_digit())
        && value.chars().any(|c| PASSWORD_SPECIALS.contains(c))
}

fn is_http_url(value: &str) -> bool {
    url::Url::parse(value).map_or(false, |u| matches!(u.scheme(), "http" | "https") && u.has_host())
}

fn display_name(field: &str) -> String {
    let spaced = field.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => spaced,
    }
}

/// Which account-specific template family a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subject {
    Email,
    Password,
    Role,
    Other,
}

fn subject(domain: &str, field: &str) -> Subject {
    if domain != DOMAIN_ACCOUNT {
        return Subject::Other;
    }
    match field {
        "email" => Subject::Email,
        "password" | "new_password" | "current_password" => Subject::Password,
        "role" => Subject::Role,
        _ => Subject::Other,
    }
}

/// Stateless validator shared by every request.
#[derive(Debug, Clone)]
pub struct Validator {
    policy: PasswordPolicy,
    backend: Option<AccountBackend>,
}

impl Validator {
    pub fn new(policy: PasswordPolicy) -> Self {
        Self { policy, backend: None }
    }

    /// Enable `uniqueemail` lookups through `backend`.
    pub fn with_backend(mut self, backend: AccountBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Check every field of `target`. Returns the composite error on failure.
    pub async fn validate<T: Validate + ?Sized>(
        &self,
        ctx: &CallContext,
        domain: &'static str,
        target: &T,
    ) -> Result<(), AccountError> {
        let mut errors = ErrorCollection::new(domain);
        for field in target.fields() {
            let rules = Rule::parse_tags(field.tags).map_err(|reason| {
                AccountError::system(domain, "validator")
                    .with_detail("field", field.name)
                    .with_cause(std::io::Error::other(reason))
            })?;
            if let Some(violation) = self.check_field(ctx, domain, &field, &rules).await {
                logging::validation_error(&violation.field, &violation.rule, violation.rejected.as_ref());
                errors.push(violation);
            }
        }
        errors.into_result()
    }

    async fn check_field(
        &self,
        ctx: &CallContext,
        domain: &'static str,
        field: &Field<'_>,
        rules: &[Rule],
    ) -> Option<FieldViolation> {
        let value = field.value.map(str::trim).filter(|v| !v.is_empty());
        let Some(value) = value else {
            return rules
                .contains(&Rule::Required)
                .then(|| self.violation(domain, field, &Rule::Required, None));
        };
        let raw = field.value.unwrap_or(value);
        for rule in rules {
            let ok = match rule {
                Rule::Required => true,
                Rule::Email => is_valid_email(value),
                Rule::Min(n) => raw.chars().count() >= *n,
                Rule::Max(n) => raw.chars().count() <= *n,
                Rule::Len(n) => raw.chars().count() == *n,
                Rule::OneOf(options) => options.iter().any(|o| o == value),
                Rule::Url => is_http_url(value),
                Rule::StrongPassword => is_strong_password(raw, &self.policy),
                Rule::UserRole => value.parse::<Role>().is_ok(),
                Rule::UniqueEmail => self.email_is_unique(ctx, value, field.owner).await,
            };
            if !ok {
                return Some(self.violation(domain, field, rule, Some(raw)));
            }
        }
        None
    }

    /// `NotFound` means unique. Any other backend failure is treated as
    /// unique and left to the write path to reject.
    async fn email_is_unique(&self, ctx: &CallContext, email: &str, owner: Option<i64>) -> bool {
        let Some(backend) = &self.backend else {
            return true;
        };
        match backend.find_by_email(ctx, email).await {
            Ok(existing) => owner == Some(existing.id),
            Err(err) if err.is_not_found() => true,
            Err(err) => {
                tracing::warn!(
                    event = "validation_degraded",
                    rule = "uniqueemail",
                    kind = err.kind().as_str(),
                    code = err.code(),
                    "uniqueness lookup failed, deferring to backend"
                );
                true
            }
        }
    }

    fn violation(&self, domain: &str, field: &Field<'_>, rule: &Rule, rejected: Option<&str>) -> FieldViolation {
        let message = self.message(domain, field.name, rule);
        let violation = FieldViolation::new(field.name, rule.tag(), message);
        match rejected {
            Some(value) => violation.with_rejected(Value::String(value.to_string())),
            None => violation,
        }
    }

    fn message(&self, domain: &str, field: &str, rule: &Rule) -> String {
        let name = display_name(field);
        match (subject(domain, field), rule) {
            (Subject::Email, Rule::Required) => "Email address is required".to_string(),
            (Subject::Email, Rule::Email) => "Please provide a valid email address".to_string(),
            (Subject::Email, Rule::UniqueEmail) => "Email address is already registered".to_string(),
            (Subject::Email, Rule::Max(n)) => format!("Email address must not exceed {n} characters"),
            (Subject::Password, Rule::Required) => format!("{name} is required"),
            (Subject::Password, Rule::Min(n)) => format!("{name} must be at least {n} characters long"),
            (Subject::Password, Rule::StrongPassword) => {
                if self.policy.require_complexity {
                    format!(
                        "{name} must be at least {} characters and contain an uppercase letter, a lowercase letter, a digit and a special character",
                        self.policy.min_length
                    )
                } else {
                    format!("{name} must be at least {} characters long", self.policy.min_length)
                }
            }
            (Subject::Role, Rule::Required) => "Role is required".to_string(),
            (Subject::Role, Rule::UserRole | Rule::OneOf(_)) => {
                format!("Role must be one of: {}", Role::NAMES.join(", "))
            }
            (_, Rule::Required) => format!("{name} is required"),
            (_, Rule::Email) => format!("{name} must be a valid email address"),
            (_, Rule::Min(n)) => format!("{name} must be at least {n} characters"),
            (_, Rule::Max(n)) => format!("{name} must not exceed {n} characters"),
            (_, Rule::Len(n)) => format!("{name} must be exactly {n} characters"),
            (_, Rule::OneOf(options)) => format!("{name} must be one of: {}", options.join(", ")),
            (_, Rule::Url) => format!("{name} must be a valid URL"),
            (_, Rule::StrongPassword) => format!("{name} is not strong enough"),
            (_, Rule::UserRole) => format!("{name} must be one of: {}", Role::NAMES.join(", ")),
            (_, Rule::UniqueEmail) => format!("{name} is already in use"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use account_stub::{InMemoryAccounts, SeedAccount};
    use tracing_test::traced_test;

    struct Signup {
        name: String,
        email: String,
        password: String,
        role: Option<String>,
        website: Option<String>,
    }

    impl Validate for Signup {
        fn fields(&self) -> Vec<Field<'_>> {
            vec![
                Field::new("name", &self.name, "required,min=2,max=100"),
                Field::new("email", &self.email, "required,email,max=254,uniqueemail"),
                Field::new("password", &self.password, "required,strongpassword"),
                Field::optional("role", self.role.as_deref(), "userrole"),
                Field::optional("website", self.website.as_deref(), "url"),
            ]
        }
    }

    fn signup() -> Signup {
        Signup {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password: "Abcdef1!".into(),
            role: None,
            website: None,
        }
    }

    fn ctx() -> CallContext {
        CallContext::new("validation-test")
    }

    fn validator() -> Validator {
        Validator::new(PasswordPolicy::default())
    }

    #[tokio::test]
    async fn valid_input_passes() {
        validator().validate(&ctx(), DOMAIN_ACCOUNT, &signup()).await.unwrap();
    }

    #[tokio::test]
    async fn each_failing_field_contributes_one_message() {
        let input = Signup {
            name: "A".into(),
            email: "not-an-email".into(),
            password: "short".into(),
            role: Some("overlord".into()),
            website: Some("ftp://x".into()),
        };
        let err = validator().validate(&ctx(), DOMAIN_ACCOUNT, &input).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.code(), "validation_failed");
        let details = err.details();
        assert_eq!(details["email"], "Please provide a valid email address");
        assert_eq!(details["role"], "Role must be one of: admin, teacher, student");
        assert_eq!(details["name"], "Name must be at least 2 characters");
        assert_eq!(details["website"], "Website must be a valid URL");
        assert!(details["password"].as_str().unwrap().starts_with("Password must be at least 8"));
    }

    #[tokio::test]
    async fn missing_required_reports_required() {
        let input = Signup { email: "  ".into(), ..signup() };
        let err = validator().validate(&ctx(), DOMAIN_ACCOUNT, &input).await.unwrap_err();
        assert_eq!(err.details()["email"], "Email address is required");
    }

    #[tokio::test]
    async fn other_domains_use_generic_templates() {
        let input = Signup { email: "nope".into(), ..signup() };
        let err = validator().validate(&ctx(), "billing", &input).await.unwrap_err();
        assert_eq!(err.details()["email"], "Email must be a valid email address");
        assert_eq!(err.domain(), "billing");
    }

    #[test]
    fn strong_password_rules() {
        let policy = PasswordPolicy::default();
        assert!(is_strong_password("Abcdef1!", &policy));
        assert!(!is_strong_password("abcdef1!", &policy));
        assert!(!is_strong_password("ABCDEF1!", &policy));
        assert!(!is_strong_password("Abcdefg!", &policy));
        assert!(!is_strong_password("Abcdefg1", &policy));
        assert!(!is_strong_password("Ab1!", &policy));
        let relaxed = PasswordPolicy { require_complexity: false, min_length: 4 };
        assert!(is_strong_password("abcd", &relaxed));
    }

    #[test]
    fn email_syntax() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.co"));
        assert!(!is_valid_email("a b@c.co"));
        assert!(!is_valid_email("a@@b.co"));
        assert_eq!(email_domain("Ada@Example.COM").as_deref(), Some("example.com"));
    }

    #[test]
    fn tags_parse() {
        assert_eq!(
            Rule::parse_tags("required, min=2,oneof=a b").unwrap(),
            vec![Rule::Required, Rule::Min(2), Rule::OneOf(vec!["a".into(), "b".into()])]
        );
        assert!(Rule::parse_tags("min=x").is_err());
        assert!(Rule::parse_tags("telepathy").is_err());
    }

    #[tokio::test]
    async fn unknown_tag_is_a_system_error() {
        struct Broken;
        impl Validate for Broken {
            fn fields(&self) -> Vec<Field<'_>> {
                vec![Field::new("x", "y", "telepathy")]
            }
        }
        let err = validator().validate(&ctx(), DOMAIN_ACCOUNT, &Broken).await.unwrap_err();
        assert!(err.is_system());
    }

    #[tokio::test]
    #[traced_test]
    async fn rejected_password_is_masked_in_logs() {
        let input = Signup { password: "weakpass-do-not-log".into(), ..signup() };
        validator().validate(&ctx(), DOMAIN_ACCOUNT, &input).await.unwrap_err();
        assert!(logs_contain("validation_error"));
        assert!(logs_contain("strongpassword"));
        assert!(!logs_contain("weakpass-do-not-log"));
    }

    #[tokio::test]
    async fn unique_email_consults_backend() {
        let store = InMemoryAccounts::new();
        let existing = store.seed(SeedAccount::new("Ada", "ada@example.com", "Abcdef1!", Role::Student));
        let validator = validator().with_backend(AccountBackend::new(Arc::new(store)));

        let err = validator.validate(&ctx(), DOMAIN_ACCOUNT, &signup()).await.unwrap_err();
        assert_eq!(err.details()["email"], "Email address is already registered");

        let fresh = Signup { email: "new@example.com".into(), ..signup() };
        validator.validate(&ctx(), DOMAIN_ACCOUNT, &fresh).await.unwrap();

        struct Rename<'a>(&'a str, i64);
        impl Validate for Rename<'_> {
            fn fields(&self) -> Vec<Field<'_>> {
                vec![Field::new("email", self.0, "email,uniqueemail").owned_by(self.1)]
            }
        }
        validator
            .validate(&ctx(), DOMAIN_ACCOUNT, &Rename("ada@example.com", existing.id))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unique_email_assumes_unique_when_backend_fails() {
        let store = InMemoryAccounts::new();
        store.seed(SeedAccount::new("Ada", "ada@example.com", "Abcdef1!", Role::Student));
        store.inject_faults(&[account_client::RpcCode::Internal]);
        let validator = validator().with_backend(AccountBackend::new(Arc::new(store)));
        validator.validate(&ctx(), DOMAIN_ACCOUNT, &signup()).await.unwrap();
    }
}
