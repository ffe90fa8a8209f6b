//! Request and reply messages of the account backend RPC service.
//!
//! Credential fields use [`Secret`], whose `Debug` output is masked.
//! [`AccountRecord`] is the backend's full view of an account and may carry
//! credential material; it is converted to an [`AccountProjection`] before
//! reaching handlers.

use account_core::{AccountProjection, AccountStatus, Role, Secret, SortOrder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The backend's view of an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: i64,
    pub branch_id: i64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub title: String,
    pub role: Role,
    #[serde(default)]
    pub owner_id: i64,
    pub status: AccountStatus,
    #[serde(default)]
    pub email_verified: bool,
    /// Stored credential hash. Never leaves the client crate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<Secret>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccountRecord {
    /// Strip credential material and keep the client-facing fields.
    pub fn into_projection(self) -> AccountProjection {
        AccountProjection {
            id: self.id,
            branch_id: self.branch_id,
            name: self.name,
            email: self.email,
            avatar: self.avatar,
            title: self.title,
            role: self.role,
            owner_id: self.owner_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: Secret,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterReply {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: Secret,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginReply {
    pub account: AccountRecord,
    pub tokens: TokenPair,
}

/// Session and refresh token pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: Secret,
    pub refresh_token: Secret,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogoutRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<Secret>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: Secret,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateTokenRequest {
    pub token: Secret,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidateTokenReply {
    pub valid: bool,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub branch_id: i64,
    pub name: String,
    pub email: String,
    pub password: Secret,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub title: String,
    pub role: Role,
    #[serde(default)]
    pub owner_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindByIdRequest {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindByEmailRequest {
    pub email: String,
}

/// Page and ordering shared by every list call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
    pub sort_by: String,
    pub sort_order: SortOrder,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
            sort_by: "created_at".to_string(),
            sort_order: SortOrder::Desc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindByRoleRequest {
    pub role: Role,
    pub page: PageRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindByBranchRequest {
    pub branch_id: i64,
    pub page: PageRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListUsersRequest {
    pub page: PageRequest,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchUsersRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statuses: Vec<AccountStatus>,
    pub page: PageRequest,
}

/// One page of accounts plus the total match count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountList {
    pub accounts: Vec<AccountRecord>,
    pub total: u64,
}

/// Partial update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteUserRequest {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub user_id: i64,
    pub current_password: Secret,
    pub new_password: Secret,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: Secret,
    pub new_password: Secret,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: Secret,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResendVerificationRequest {
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAccountStatusRequest {
    pub id: i64,
    pub status: AccountStatus,
}

/// Generic acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

impl Ack {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AccountRecord {
        let now = Utc::now();
        AccountRecord {
            id: 1,
            branch_id: 2,
            name: "Ada".into(),
            email: "ada@example.com".into(),
            avatar: String::new(),
            title: String::new(),
            role: Role::Student,
            owner_id: 0,
            status: AccountStatus::Active,
            email_verified: true,
            password_hash: Some(Secret::from("$hash$")),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn projection_drops_credentials() {
        let projection = record().into_projection();
        let json = serde_json::to_string(&projection).unwrap();
        assert!(!json.contains("$hash$"));
        assert!(!json.contains("password"));
        assert_eq!(projection.id, 1);
    }

    #[test]
    fn debug_of_requests_masks_secrets() {
        let req = LoginRequest {
            email: "ada@example.com".into(),
            password: Secret::from("Abcdef1!"),
        };
        assert!(!format!("{req:?}").contains("Abcdef1!"));
    }
}
