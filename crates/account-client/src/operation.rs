//! Per-method call policy: wire name, timeout class, and idempotency.

use std::fmt;
use std::time::Duration;

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for create, update, and list calls.
pub const EXTENDED_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout class of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutClass {
    Default,
    Extended,
}

/// Every backend RPC method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcOperation {
    Register,
    Login,
    Logout,
    RefreshToken,
    ValidateToken,
    CreateUser,
    FindById,
    FindByEmail,
    FindByRole,
    FindByBranch,
    UpdateUser,
    DeleteUser,
    FindAllUsers,
    SearchUsers,
    ChangePassword,
    ForgotPassword,
    ResetPassword,
    VerifyEmail,
    ResendVerification,
    UpdateAccountStatus,
}

impl RpcOperation {
    pub const ALL: [RpcOperation; 20] = [
        Self::Register,
        Self::Login,
        Self::Logout,
        Self::RefreshToken,
        Self::ValidateToken,
        Self::CreateUser,
        Self::FindById,
        Self::FindByEmail,
        Self::FindByRole,
        Self::FindByBranch,
        Self::UpdateUser,
        Self::DeleteUser,
        Self::FindAllUsers,
        Self::SearchUsers,
        Self::ChangePassword,
        Self::ForgotPassword,
        Self::ResetPassword,
        Self::VerifyEmail,
        Self::ResendVerification,
        Self::UpdateAccountStatus,
    ];

    /// Method name on the wire (`POST /rpc/{method}`).
    pub fn method(self) -> &'static str {
        match self {
            Self::Register => "Register",
            Self::Login => "Login",
            Self::Logout => "Logout",
            Self::RefreshToken => "RefreshToken",
            Self::ValidateToken => "ValidateToken",
            Self::CreateUser => "CreateUser",
            Self::FindById => "FindById",
            Self::FindByEmail => "FindByEmail",
            Self::FindByRole => "FindByRole",
            Self::FindByBranch => "FindByBranch",
            Self::UpdateUser => "UpdateUser",
            Self::DeleteUser => "DeleteUser",
            Self::FindAllUsers => "FindAllUsers",
            Self::SearchUsers => "SearchUsers",
            Self::ChangePassword => "ChangePassword",
            Self::ForgotPassword => "ForgotPassword",
            Self::ResetPassword => "ResetPassword",
            Self::VerifyEmail => "VerifyEmail",
            Self::ResendVerification => "ResendVerification",
            Self::UpdateAccountStatus => "UpdateAccountStatus",
        }
    }

    /// Parse a wire method name.
    pub fn from_method(method: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.method() == method)
    }

    /// snake_case name used in logs and metrics.
    pub fn name(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Login => "login",
            Self::Logout => "logout",
            Self::RefreshToken => "refresh_token",
            Self::ValidateToken => "validate_token",
            Self::CreateUser => "create_user",
            Self::FindById => "find_by_id",
            Self::FindByEmail => "find_by_email",
            Self::FindByRole => "find_by_role",
            Self::FindByBranch => "find_by_branch",
            Self::UpdateUser => "update_user",
            Self::DeleteUser => "delete_user",
            Self::FindAllUsers => "find_all_users",
            Self::SearchUsers => "search_users",
            Self::ChangePassword => "change_password",
            Self::ForgotPassword => "forgot_password",
            Self::ResetPassword => "reset_password",
            Self::VerifyEmail => "verify_email",
            Self::ResendVerification => "resend_verification",
            Self::UpdateAccountStatus => "update_account_status",
        }
    }

    pub fn timeout_class(self) -> TimeoutClass {
        match self {
            Self::Register
            | Self::CreateUser
            | Self::UpdateUser
            | Self::UpdateAccountStatus
            | Self::FindAllUsers
            | Self::SearchUsers
            | Self::FindByRole
            | Self::FindByBranch => TimeoutClass::Extended,
            _ => TimeoutClass::Default,
        }
    }

    /// Safe to repeat without an idempotency key.
    ///
    /// Reads, token validation, logout, delete, and status updates (which
    /// set an absolute value) repeat safely. Everything else creates or
    /// consumes state and is retried only when the caller asserts
    /// idempotency.
    pub fn is_idempotent(self) -> bool {
        matches!(
            self,
            Self::ValidateToken
                | Self::Logout
                | Self::FindById
                | Self::FindByEmail
                | Self::FindByRole
                | Self::FindByBranch
                | Self::FindAllUsers
                | Self::SearchUsers
                | Self::DeleteUser
                | Self::UpdateAccountStatus
        )
    }
}

impl fmt::Display for RpcOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_round_trip() {
        for op in RpcOperation::ALL {
            assert_eq!(RpcOperation::from_method(op.method()), Some(op));
        }
        assert_eq!(RpcOperation::from_method("DropTables"), None);
    }

    #[test]
    fn writes_without_key_are_not_idempotent() {
        assert!(!RpcOperation::Register.is_idempotent());
        assert!(!RpcOperation::CreateUser.is_idempotent());
        assert!(!RpcOperation::Login.is_idempotent());
        assert!(RpcOperation::DeleteUser.is_idempotent());
        assert!(RpcOperation::FindById.is_idempotent());
    }

    #[test]
    fn create_update_list_use_extended_timeout() {
        assert_eq!(RpcOperation::CreateUser.timeout_class(), TimeoutClass::Extended);
        assert_eq!(RpcOperation::UpdateUser.timeout_class(), TimeoutClass::Extended);
        assert_eq!(RpcOperation::FindAllUsers.timeout_class(), TimeoutClass::Extended);
        assert_eq!(RpcOperation::FindById.timeout_class(), TimeoutClass::Default);
        assert_eq!(RpcOperation::Login.timeout_class(), TimeoutClass::Default);
    }
}
