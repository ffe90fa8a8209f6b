//! # Request and Response Bodies
//!
//! Wire shapes of the `/accounts` endpoints. Request bodies list their
//! field names for unknown-field rejection ([`JsonBody`]) and their checks
//! for the validation engine ([`Validate`]). Credential fields are
//! [`Secret`]s, redacted in `Debug` and never logged.

use account_core::{AccountProjection, AccountStatus, Secret};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::extractors::JsonBody;
use crate::validation::{Field, Validate};

const NAME_TAGS: &str = "required,min=2,max=100";
const EMAIL_TAGS: &str = "required,email,max=254";

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterBody {
    pub name: String,
    pub email: String,
    #[schema(value_type = String, format = Password)]
    pub password: Secret,
}

impl JsonBody for RegisterBody {
    const FIELDS: &'static [&'static str] = &["name", "email", "password"];
}

impl Validate for RegisterBody {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::new("name", &self.name, NAME_TAGS),
            Field::new("email", &self.email, EMAIL_TAGS),
            Field::new("password", self.password.expose(), "required,strongpassword"),
        ]
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginBody {
    pub email: String,
    #[schema(value_type = String, format = Password)]
    pub password: Secret,
}

impl JsonBody for LoginBody {
    const FIELDS: &'static [&'static str] = &["email", "password"];
}

impl Validate for LoginBody {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::new("email", &self.email, EMAIL_TAGS),
            Field::new("password", self.password.expose(), "required,max=256"),
        ]
    }
}

/// Logout body. Optional; an empty body is accepted.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LogoutBody {
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub refresh_token: Option<Secret>,
}

impl JsonBody for LogoutBody {
    const FIELDS: &'static [&'static str] = &["refresh_token"];
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshTokenBody {
    #[schema(value_type = String)]
    pub refresh_token: Secret,
}

impl JsonBody for RefreshTokenBody {
    const FIELDS: &'static [&'static str] = &["refresh_token"];
}

impl Validate for RefreshTokenBody {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![Field::new("refresh_token", self.refresh_token.expose(), "required,max=512")]
    }
}

// ---------------------------------------------------------------------------
// Password & email lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordBody {
    #[schema(value_type = String, format = Password)]
    pub current_password: Secret,
    #[schema(value_type = String, format = Password)]
    pub new_password: Secret,
}

impl JsonBody for ChangePasswordBody {
    const FIELDS: &'static [&'static str] = &["current_password", "new_password"];
}

impl Validate for ChangePasswordBody {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::new("current_password", self.current_password.expose(), "required"),
            Field::new("new_password", self.new_password.expose(), "required,strongpassword"),
        ]
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ForgotPasswordBody {
    pub email: String,
}

impl JsonBody for ForgotPasswordBody {
    const FIELDS: &'static [&'static str] = &["email"];
}

impl Validate for ForgotPasswordBody {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![Field::new("email", &self.email, EMAIL_TAGS)]
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordBody {
    #[schema(value_type = String)]
    pub token: Secret,
    #[schema(value_type = String, format = Password)]
    pub new_password: Secret,
}

impl JsonBody for ResetPasswordBody {
    const FIELDS: &'static [&'static str] = &["token", "new_password"];
}

impl Validate for ResetPasswordBody {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::new("token", self.token.expose(), "required,max=512"),
            Field::new("new_password", self.new_password.expose(), "required,strongpassword"),
        ]
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResendVerificationBody {
    pub email: String,
}

impl JsonBody for ResendVerificationBody {
    const FIELDS: &'static [&'static str] = &["email"];
}

impl Validate for ResendVerificationBody {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![Field::new("email", &self.email, EMAIL_TAGS)]
    }
}

// ---------------------------------------------------------------------------
// Account management
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserBody {
    pub branch_id: i64,
    pub name: String,
    pub email: String,
    #[schema(value_type = String, format = Password)]
    pub password: Secret,
    pub role: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Defaults to the caller.
    #[serde(default)]
    pub owner_id: Option<i64>,
}

impl JsonBody for CreateUserBody {
    const FIELDS: &'static [&'static str] = &["branch_id", "name", "email", "password", "role", "avatar", "title", "owner_id"];
}

impl Validate for CreateUserBody {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::new("name", &self.name, NAME_TAGS),
            Field::new("email", &self.email, "required,email,max=254,uniqueemail"),
            Field::new("password", self.password.expose(), "required,strongpassword"),
            Field::new("role", &self.role, "required,userrole"),
            Field::optional("avatar", self.avatar.as_deref(), "url,max=2048"),
            Field::optional("title", self.title.as_deref(), "max=100"),
        ]
    }
}

/// Partial update. Only provided fields are validated and changed.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateUserBody {
    #[serde(default)]
    pub branch_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub owner_id: Option<i64>,
}

impl JsonBody for UpdateUserBody {
    const FIELDS: &'static [&'static str] = &["branch_id", "name", "email", "avatar", "title", "role", "owner_id"];
}

impl UpdateUserBody {
    pub fn is_empty(&self) -> bool {
        self.branch_id.is_none()
            && self.name.is_none()
            && self.email.is_none()
            && self.avatar.is_none()
            && self.title.is_none()
            && self.role.is_none()
            && self.owner_id.is_none()
    }

    /// Checks for an update of account `target_id`.
    pub fn checks(&self, target_id: i64) -> UpdateUserChecks<'_> {
        UpdateUserChecks { body: self, target_id }
    }
}

pub struct UpdateUserChecks<'a> {
    body: &'a UpdateUserBody,
    target_id: i64,
}

impl Validate for UpdateUserChecks<'_> {
    fn fields(&self) -> Vec<Field<'_>> {
        let b = self.body;
        let mut fields = Vec::new();
        // A provided field must not be blank, so each present one is required.
        if let Some(name) = &b.name {
            fields.push(Field::new("name", name, "required,max=100"));
        }
        if let Some(email) = &b.email {
            fields.push(Field::new("email", email, "required,email,max=254,uniqueemail").owned_by(self.target_id));
        }
        if let Some(role) = &b.role {
            fields.push(Field::new("role", role, "required,userrole"));
        }
        fields.push(Field::optional("avatar", b.avatar.as_deref(), "url,max=2048"));
        fields.push(Field::optional("title", b.title.as_deref(), "max=100"));
        fields
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusBody {
    pub status: String,
}

impl JsonBody for UpdateStatusBody {
    const FIELDS: &'static [&'static str] = &["status"];
}

impl Validate for UpdateStatusBody {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![Field::new("status", &self.status, "required,oneof=active inactive suspended pending")]
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub user: AccountProjection,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidateTokenResponse {
    pub valid: bool,
    pub id: i64,
    pub expires_at: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BranchSummary {
    pub branch_id: i64,
    pub total_users: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusUpdateResponse {
    pub user: AccountProjection,
    pub status: AccountStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::{decode_json, DecodeOptions};

    #[test]
    fn secrets_stay_out_of_debug() {
        let body: LoginBody =
            decode_json(br#"{"email":"a@b.co","password":"Hunter2!x"}"#, DecodeOptions::new(1024)).unwrap();
        assert!(!format!("{body:?}").contains("Hunter2!x"));
    }

    #[test]
    fn update_body_emptiness() {
        let body: UpdateUserBody = decode_json(b"{}", DecodeOptions::new(1024)).unwrap();
        assert!(body.is_empty());
        let body: UpdateUserBody = decode_json(br#"{"name":"X"}"#, DecodeOptions::new(1024)).unwrap();
        assert!(!body.is_empty());
        assert_eq!(body.checks(1).fields().len(), 3);
    }

    #[test]
    fn register_rejects_extra_fields() {
        let err = decode_json::<RegisterBody>(
            br#"{"name":"Ada","email":"a@b.co","password":"Abcdef1!","role":"admin"}"#,
            DecodeOptions::new(1024),
        )
        .unwrap_err();
        assert_eq!(err.code(), "unknown_field");
    }
}
