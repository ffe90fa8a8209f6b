//! # HTTP/JSON Transport for the Account Backend
//!
//! Carries the [`AccountRpc`] contract over HTTP: each method is a
//! `POST {base_url}/rpc/{Method}` with a JSON request body.
//!
//! ## Wire Format
//!
//! - 2xx: the JSON reply message.
//! - non-2xx: `{ "code": "NOT_FOUND", "message": "..." }` with a gRPC-style
//!   status name. Bodies that do not parse fall back to a code derived from
//!   the HTTP status.
//!
//! ## Failure Mapping
//!
//! Connection failures become `Unavailable`; client-side timeouts become
//! `DeadlineExceeded`. The adapter applies the per-operation timeout; the
//! `reqwest` client timeout here is only an outer ceiling.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::operation::RpcOperation;
use crate::rpc::{AccountRpc, CallContext, RpcCode, RpcStatus};
use crate::types::*;

/// Header carrying the edge request id to the backend.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Configuration for [`HttpAccountRpc`].
#[derive(Debug, Clone)]
pub struct HttpRpcConfig {
    /// Base URL of the backend, e.g. `http://accounts.internal:8090`.
    pub base_url: String,
    /// Outer request timeout in seconds (default: 30).
    pub timeout_secs: u64,
}

impl HttpRpcConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: 30,
        }
    }
}

/// Failure to construct the transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid backend URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// JSON-over-HTTP implementation of [`AccountRpc`].
#[derive(Debug, Clone)]
pub struct HttpAccountRpc {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpAccountRpc {
    pub fn new(config: HttpRpcConfig) -> Result<Self, TransportError> {
        let mut raw = config.base_url.trim_end_matches('/').to_string();
        raw.push('/');
        let base_url = Url::parse(&raw).map_err(|source| TransportError::InvalidUrl {
            url: config.base_url.clone(),
            source,
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn call<Req, Resp>(&self, ctx: &CallContext, op: RpcOperation, req: &Req) -> Result<Resp, RpcStatus>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = self
            .base_url
            .join(&format!("rpc/{}", op.method()))
            .map_err(|e| RpcStatus::internal(format!("{}: bad endpoint: {e}", op.method())))?;

        let resp = self
            .client
            .post(url)
            .header(REQUEST_ID_HEADER, &ctx.request_id)
            .json(req)
            .send()
            .await
            .map_err(|e| transport_failure(op, &e))?;

        let status = resp.status();
        if status.is_success() {
            return resp
                .json::<Resp>()
                .await
                .map_err(|e| RpcStatus::internal(format!("{}: reply deserialization failed: {e}", op.method())));
        }

        let body = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<RpcStatus>(&body) {
            Ok(rpc_status) => Err(rpc_status),
            Err(_) => Err(RpcStatus::new(
                code_for_http_status(status.as_u16()),
                format!("{}: HTTP {status}", op.method()),
            )),
        }
    }
}

fn transport_failure(op: RpcOperation, e: &reqwest::Error) -> RpcStatus {
    if e.is_timeout() {
        RpcStatus::deadline_exceeded(format!("{}: {e}", op.method()))
    } else {
        RpcStatus::unavailable(format!("{}: {e}", op.method()))
    }
}

/// Fallback code when an error reply carries no status body.
pub fn code_for_http_status(status: u16) -> RpcCode {
    match status {
        400 => RpcCode::InvalidArgument,
        401 => RpcCode::Unauthenticated,
        403 => RpcCode::PermissionDenied,
        404 => RpcCode::NotFound,
        409 => RpcCode::AlreadyExists,
        412 | 422 => RpcCode::FailedPrecondition,
        429 => RpcCode::ResourceExhausted,
        502 | 503 => RpcCode::Unavailable,
        504 => RpcCode::DeadlineExceeded,
        501 => RpcCode::Unimplemented,
        _ => RpcCode::Unknown,
    }
}

#[async_trait]
impl AccountRpc for HttpAccountRpc {
    async fn register(&self, ctx: &CallContext, req: RegisterRequest) -> Result<RegisterReply, RpcStatus> {
        self.call(ctx, RpcOperation::Register, &req).await
    }

    async fn login(&self, ctx: &CallContext, req: LoginRequest) -> Result<LoginReply, RpcStatus> {
        self.call(ctx, RpcOperation::Login, &req).await
    }

    async fn logout(&self, ctx: &CallContext, req: LogoutRequest) -> Result<Ack, RpcStatus> {
        self.call(ctx, RpcOperation::Logout, &req).await
    }

    async fn refresh_token(&self, ctx: &CallContext, req: RefreshTokenRequest) -> Result<TokenPair, RpcStatus> {
        self.call(ctx, RpcOperation::RefreshToken, &req).await
    }

    async fn validate_token(
        &self,
        ctx: &CallContext,
        req: ValidateTokenRequest,
    ) -> Result<ValidateTokenReply, RpcStatus> {
        self.call(ctx, RpcOperation::ValidateToken, &req).await
    }

    async fn create_user(&self, ctx: &CallContext, req: CreateUserRequest) -> Result<AccountRecord, RpcStatus> {
        self.call(ctx, RpcOperation::CreateUser, &req).await
    }

    async fn find_by_id(&self, ctx: &CallContext, req: FindByIdRequest) -> Result<AccountRecord, RpcStatus> {
        self.call(ctx, RpcOperation::FindById, &req).await
    }

    async fn find_by_email(&self, ctx: &CallContext, req: FindByEmailRequest) -> Result<AccountRecord, RpcStatus> {
        self.call(ctx, RpcOperation::FindByEmail, &req).await
    }

    async fn find_by_role(&self, ctx: &CallContext, req: FindByRoleRequest) -> Result<AccountList, RpcStatus> {
        self.call(ctx, RpcOperation::FindByRole, &req).await
    }

    async fn find_by_branch(&self, ctx: &CallContext, req: FindByBranchRequest) -> Result<AccountList, RpcStatus> {
        self.call(ctx, RpcOperation::FindByBranch, &req).await
    }

    async fn update_user(&self, ctx: &CallContext, req: UpdateUserRequest) -> Result<AccountRecord, RpcStatus> {
        self.call(ctx, RpcOperation::UpdateUser, &req).await
    }

    async fn delete_user(&self, ctx: &CallContext, req: DeleteUserRequest) -> Result<Ack, RpcStatus> {
        self.call(ctx, RpcOperation::DeleteUser, &req).await
    }

    async fn find_all_users(&self, ctx: &CallContext, req: ListUsersRequest) -> Result<AccountList, RpcStatus> {
        self.call(ctx, RpcOperation::FindAllUsers, &req).await
    }

    async fn search_users(&self, ctx: &CallContext, req: SearchUsersRequest) -> Result<AccountList, RpcStatus> {
        self.call(ctx, RpcOperation::SearchUsers, &req).await
    }

    async fn change_password(&self, ctx: &CallContext, req: ChangePasswordRequest) -> Result<Ack, RpcStatus> {
        self.call(ctx, RpcOperation::ChangePassword, &req).await
    }

    async fn forgot_password(&self, ctx: &CallContext, req: ForgotPasswordRequest) -> Result<Ack, RpcStatus> {
        self.call(ctx, RpcOperation::ForgotPassword, &req).await
    }

    async fn reset_password(&self, ctx: &CallContext, req: ResetPasswordRequest) -> Result<Ack, RpcStatus> {
        self.call(ctx, RpcOperation::ResetPassword, &req).await
    }

    async fn verify_email(&self, ctx: &CallContext, req: VerifyEmailRequest) -> Result<Ack, RpcStatus> {
        self.call(ctx, RpcOperation::VerifyEmail, &req).await
    }

    async fn resend_verification(
        &self,
        ctx: &CallContext,
        req: ResendVerificationRequest,
    ) -> Result<Ack, RpcStatus> {
        self.call(ctx, RpcOperation::ResendVerification, &req).await
    }

    async fn update_account_status(
        &self,
        ctx: &CallContext,
        req: UpdateAccountStatusRequest,
    ) -> Result<AccountRecord, RpcStatus> {
        self.call(ctx, RpcOperation::UpdateAccountStatus, &req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let rpc = HttpAccountRpc::new(HttpRpcConfig::new("http://localhost:8090/backend")).unwrap();
        assert_eq!(rpc.base_url().as_str(), "http://localhost:8090/backend/");
        let joined = rpc.base_url().join("rpc/FindById").unwrap();
        assert_eq!(joined.as_str(), "http://localhost:8090/backend/rpc/FindById");
    }

    #[test]
    fn invalid_url_is_rejected() {
        let err = HttpAccountRpc::new(HttpRpcConfig::new("not a url")).unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl { .. }));
    }

    #[test]
    fn http_status_fallbacks() {
        assert_eq!(code_for_http_status(404), RpcCode::NotFound);
        assert_eq!(code_for_http_status(503), RpcCode::Unavailable);
        assert_eq!(code_for_http_status(504), RpcCode::DeadlineExceeded);
        assert_eq!(code_for_http_status(418), RpcCode::Unknown);
    }
}
