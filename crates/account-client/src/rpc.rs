//! # Account Backend RPC Contract
//!
//! The typed interface of the account backend service. Each method takes a
//! typed request and returns either a typed reply or a transport-level
//! [`RpcStatus`]. Implementations:
//!
//! - [`crate::http::HttpAccountRpc`]: JSON over HTTP to a remote backend.
//! - `account_stub::InMemoryAccounts`: in-process store for development
//!   and tests.
//!
//! Implementations are `Send + Sync` and shared via `Arc` across requests.
//! Translating [`RpcStatus`] into the error taxonomy is the job of
//! [`crate::adapter::AccountBackend`], nothing else.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::*;

/// Transport-level status code, named after the gRPC canonical codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcCode {
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl RpcCode {
    pub const ALL: [RpcCode; 16] = [
        RpcCode::Cancelled,
        RpcCode::Unknown,
        RpcCode::InvalidArgument,
        RpcCode::DeadlineExceeded,
        RpcCode::NotFound,
        RpcCode::AlreadyExists,
        RpcCode::PermissionDenied,
        RpcCode::ResourceExhausted,
        RpcCode::FailedPrecondition,
        RpcCode::Aborted,
        RpcCode::OutOfRange,
        RpcCode::Unimplemented,
        RpcCode::Internal,
        RpcCode::Unavailable,
        RpcCode::DataLoss,
        RpcCode::Unauthenticated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cancelled => "CANCELLED",
            Self::Unknown => "UNKNOWN",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
            Self::Aborted => "ABORTED",
            Self::OutOfRange => "OUT_OF_RANGE",
            Self::Unimplemented => "UNIMPLEMENTED",
            Self::Internal => "INTERNAL",
            Self::Unavailable => "UNAVAILABLE",
            Self::DataLoss => "DATA_LOSS",
            Self::Unauthenticated => "UNAUTHENTICATED",
        }
    }
}

impl fmt::Display for RpcCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport-level failure returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct RpcStatus {
    pub code: RpcCode,
    pub message: String,
}

impl RpcStatus {
    pub fn new(code: RpcCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RpcCode::NotFound, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(RpcCode::InvalidArgument, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Unauthenticated, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(RpcCode::AlreadyExists, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Unavailable, message)
    }

    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(RpcCode::DeadlineExceeded, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Internal, message)
    }
}

/// Per-call metadata propagated to the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    pub request_id: String,
}

impl CallContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
        }
    }
}

/// The account backend service.
#[async_trait]
pub trait AccountRpc: Send + Sync {
    async fn register(&self, ctx: &CallContext, req: RegisterRequest) -> Result<RegisterReply, RpcStatus>;

    async fn login(&self, ctx: &CallContext, req: LoginRequest) -> Result<LoginReply, RpcStatus>;

    async fn logout(&self, ctx: &CallContext, req: LogoutRequest) -> Result<Ack, RpcStatus>;

    async fn refresh_token(&self, ctx: &CallContext, req: RefreshTokenRequest) -> Result<TokenPair, RpcStatus>;

    async fn validate_token(
        &self,
        ctx: &CallContext,
        req: ValidateTokenRequest,
    ) -> Result<ValidateTokenReply, RpcStatus>;

    async fn create_user(&self, ctx: &CallContext, req: CreateUserRequest) -> Result<AccountRecord, RpcStatus>;

    async fn find_by_id(&self, ctx: &CallContext, req: FindByIdRequest) -> Result<AccountRecord, RpcStatus>;

    async fn find_by_email(&self, ctx: &CallContext, req: FindByEmailRequest) -> Result<AccountRecord, RpcStatus>;

    async fn find_by_role(&self, ctx: &CallContext, req: FindByRoleRequest) -> Result<AccountList, RpcStatus>;

    async fn find_by_branch(&self, ctx: &CallContext, req: FindByBranchRequest) -> Result<AccountList, RpcStatus>;

    async fn update_user(&self, ctx: &CallContext, req: UpdateUserRequest) -> Result<AccountRecord, RpcStatus>;

    async fn delete_user(&self, ctx: &CallContext, req: DeleteUserRequest) -> Result<Ack, RpcStatus>;

    async fn find_all_users(&self, ctx: &CallContext, req: ListUsersRequest) -> Result<AccountList, RpcStatus>;

    async fn search_users(&self, ctx: &CallContext, req: SearchUsersRequest) -> Result<AccountList, RpcStatus>;

    async fn change_password(&self, ctx: &CallContext, req: ChangePasswordRequest) -> Result<Ack, RpcStatus>;

    async fn forgot_password(&self, ctx: &CallContext, req: ForgotPasswordRequest) -> Result<Ack, RpcStatus>;

    async fn reset_password(&self, ctx: &CallContext, req: ResetPasswordRequest) -> Result<Ack, RpcStatus>;

    async fn verify_email(&self, ctx: &CallContext, req: VerifyEmailRequest) -> Result<Ack, RpcStatus>;

    async fn resend_verification(
        &self,
        ctx: &CallContext,
        req: ResendVerificationRequest,
    ) -> Result<Ack, RpcStatus>;

    async fn update_account_status(
        &self,
        ctx: &CallContext,
        req: UpdateAccountStatusRequest,
    ) -> Result<AccountRecord, RpcStatus>;
}
