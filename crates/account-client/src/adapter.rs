//! # Account Backend Adapter
//!
//! [`AccountBackend`] is the only path from handlers to the backend. For
//! every call it:
//!
//! 1. Bounds the call with the operation's timeout (5s, or 10s for create,
//!    update, and list calls).
//! 2. Translates transport failures into [`AccountError`] via
//!    [`crate::mapping::status_to_error`].
//! 3. Retries retryable failures (up to 3 attempts, linear backoff) when the
//!    operation is idempotent or the caller asserted an idempotency key.
//!    Otherwise a retryable failure is demoted to a non-retryable 502.
//! 4. Strips credential material from returned accounts.
//!
//! Dropping the returned future cancels the in-flight call.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use account_core::{AccountError, AccountPage, AccountProjection, AccountStatus, PageInfo};

use crate::mapping::{demote_retryable, status_to_error, SERVICE_NAME};
use crate::operation::{RpcOperation, TimeoutClass, DEFAULT_TIMEOUT, EXTENDED_TIMEOUT};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::rpc::{AccountRpc, CallContext, RpcStatus};
use crate::types::*;

/// Timeouts and retry budget of the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterConfig {
    pub default_timeout: Duration,
    pub extended_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            extended_timeout: EXTENDED_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

impl AdapterConfig {
    pub fn timeout_for(&self, op: RpcOperation) -> Duration {
        match op.timeout_class() {
            TimeoutClass::Default => self.default_timeout,
            TimeoutClass::Extended => self.extended_timeout,
        }
    }
}

/// Outcome of a successful login.
#[derive(Debug, Clone)]
pub struct Session {
    pub account: AccountProjection,
    pub status: AccountStatus,
    pub email_verified: bool,
    pub tokens: TokenPair,
}

/// Shared handle to the account backend.
#[derive(Clone)]
pub struct AccountBackend {
    rpc: Arc<dyn AccountRpc>,
    config: AdapterConfig,
}

impl std::fmt::Debug for AccountBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountBackend")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AccountBackend {
    pub fn new(rpc: Arc<dyn AccountRpc>) -> Self {
        Self::with_config(rpc, AdapterConfig::default())
    }

    pub fn with_config(rpc: Arc<dyn AccountRpc>, config: AdapterConfig) -> Self {
        Self { rpc, config }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Run one backend operation under the adapter's timeout, retry, and
    /// error-mapping policy.
    async fn execute<T, F, Fut>(
        &self,
        ctx: &CallContext,
        op: RpcOperation,
        asserted_idempotent: bool,
        call: F,
    ) -> Result<T, AccountError>
    where
        F: Fn(Arc<dyn AccountRpc>) -> Fut,
        Fut: Future<Output = Result<T, RpcStatus>>,
    {
        let retry_allowed = op.is_idempotent() || asserted_idempotent;
        let policy = if retry_allowed {
            self.config.retry
        } else {
            RetryPolicy::no_retry()
        };
        let timeout = self.config.timeout_for(op);
        let started = Instant::now();

        let attempted = retry_with_backoff(policy, op.name(), || {
            let fut = call(Arc::clone(&self.rpc));
            async move {
                match tokio::time::timeout(timeout, fut).await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(status)) => Err(status_to_error(op, status)),
                    Err(_) => Err(status_to_error(
                        op,
                        RpcStatus::deadline_exceeded(format!("{} exceeded {timeout:?}", op.method())),
                    )),
                }
            }
        })
        .await;

        let result = match attempted.result {
            Err(err) if !retry_allowed => Err(demote_retryable(op, err)),
            other => other,
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => err.kind().as_str(),
        };
        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => tracing::info!(
                event = "service_call",
                service = SERVICE_NAME,
                method = op.method(),
                request_id = %ctx.request_id,
                attempts = attempted.attempts,
                duration_ms,
                success = true,
                "backend call succeeded"
            ),
            Err(err) => tracing::warn!(
                event = "service_call",
                service = SERVICE_NAME,
                method = op.method(),
                request_id = %ctx.request_id,
                attempts = attempted.attempts,
                duration_ms,
                success = false,
                kind = err.kind().as_str(),
                code = err.code(),
                cause = ?err.cause_chain(),
                "backend call failed"
            ),
        }
        metrics::counter!(
            "account_backend_calls_total",
            "method" => op.method(),
            "outcome" => outcome
        )
        .increment(1);

        result
    }

    // ── Authentication ──────────────────────────────────────────────

    /// Register a new account. Retried only when the request carries an
    /// idempotency key.
    pub async fn register(&self, ctx: &CallContext, req: RegisterRequest) -> Result<RegisterReply, AccountError> {
        let asserted = req.idempotency_key.is_some();
        self.execute(ctx, RpcOperation::Register, asserted, |rpc| {
            let req = req.clone();
            async move { rpc.register(ctx, req).await }
        })
        .await
    }

    pub async fn login(&self, ctx: &CallContext, req: LoginRequest) -> Result<Session, AccountError> {
        let reply = self
            .execute(ctx, RpcOperation::Login, false, |rpc| {
                let req = req.clone();
                async move { rpc.login(ctx, req).await }
            })
            .await?;
        let status = reply.account.status;
        let email_verified = reply.account.email_verified;
        Ok(Session {
            account: reply.account.into_projection(),
            status,
            email_verified,
            tokens: reply.tokens,
        })
    }

    pub async fn logout(&self, ctx: &CallContext, req: LogoutRequest) -> Result<Ack, AccountError> {
        self.execute(ctx, RpcOperation::Logout, false, |rpc| {
            let req = req.clone();
            async move { rpc.logout(ctx, req).await }
        })
        .await
    }

    pub async fn refresh_token(&self, ctx: &CallContext, req: RefreshTokenRequest) -> Result<TokenPair, AccountError> {
        self.execute(ctx, RpcOperation::RefreshToken, false, |rpc| {
            let req = req.clone();
            async move { rpc.refresh_token(ctx, req).await }
        })
        .await
    }

    pub async fn validate_token(
        &self,
        ctx: &CallContext,
        req: ValidateTokenRequest,
    ) -> Result<ValidateTokenReply, AccountError> {
        self.execute(ctx, RpcOperation::ValidateToken, false, |rpc| {
            let req = req.clone();
            async move { rpc.validate_token(ctx, req).await }
        })
        .await
    }

    // ── Accounts ────────────────────────────────────────────────────

    pub async fn create_user(&self, ctx: &CallContext, req: CreateUserRequest) -> Result<AccountProjection, AccountError> {
        let asserted = req.idempotency_key.is_some();
        self.execute(ctx, RpcOperation::CreateUser, asserted, |rpc| {
            let req = req.clone();
            async move { rpc.create_user(ctx, req).await }
        })
        .await
        .map(AccountRecord::into_projection)
    }

    pub async fn find_by_id(&self, ctx: &CallContext, id: i64) -> Result<AccountProjection, AccountError> {
        self.find_record(ctx, id).await.map(AccountRecord::into_projection)
    }

    async fn find_record(&self, ctx: &CallContext, id: i64) -> Result<AccountRecord, AccountError> {
        self.execute(ctx, RpcOperation::FindById, false, |rpc| async move {
            rpc.find_by_id(ctx, FindByIdRequest { id }).await
        })
        .await
    }

    pub async fn find_by_email(&self, ctx: &CallContext, email: &str) -> Result<AccountProjection, AccountError> {
        self.execute(ctx, RpcOperation::FindByEmail, false, |rpc| {
            let req = FindByEmailRequest {
                email: email.to_string(),
            };
            async move { rpc.find_by_email(ctx, req).await }
        })
        .await
        .map(AccountRecord::into_projection)
    }

    pub async fn find_by_role(&self, ctx: &CallContext, req: FindByRoleRequest) -> Result<AccountPage, AccountError> {
        let page = req.page.clone();
        let list = self
            .execute(ctx, RpcOperation::FindByRole, false, |rpc| {
                let req = req.clone();
                async move { rpc.find_by_role(ctx, req).await }
            })
            .await?;
        Ok(into_page(list, &page))
    }

    pub async fn find_by_branch(
        &self,
        ctx: &CallContext,
        req: FindByBranchRequest,
    ) -> Result<AccountPage, AccountError> {
        let page = req.page.clone();
        let list = self
            .execute(ctx, RpcOperation::FindByBranch, false, |rpc| {
                let req = req.clone();
                async move { rpc.find_by_branch(ctx, req).await }
            })
            .await?;
        Ok(into_page(list, &page))
    }

    pub async fn update_user(&self, ctx: &CallContext, req: UpdateUserRequest) -> Result<AccountProjection, AccountError> {
        self.execute(ctx, RpcOperation::UpdateUser, false, |rpc| {
            let req = req.clone();
            async move { rpc.update_user(ctx, req).await }
        })
        .await
        .map(AccountRecord::into_projection)
    }

    pub async fn delete_user(&self, ctx: &CallContext, id: i64) -> Result<Ack, AccountError> {
        self.execute(ctx, RpcOperation::DeleteUser, false, |rpc| async move {
            rpc.delete_user(ctx, DeleteUserRequest { id }).await
        })
        .await
    }

    pub async fn find_all_users(&self, ctx: &CallContext, req: ListUsersRequest) -> Result<AccountPage, AccountError> {
        let page = req.page.clone();
        let list = self
            .execute(ctx, RpcOperation::FindAllUsers, false, |rpc| {
                let req = req.clone();
                async move { rpc.find_all_users(ctx, req).await }
            })
            .await?;
        Ok(into_page(list, &page))
    }

    pub async fn search_users(&self, ctx: &CallContext, req: SearchUsersRequest) -> Result<AccountPage, AccountError> {
        let page = req.page.clone();
        let list = self
            .execute(ctx, RpcOperation::SearchUsers, false, |rpc| {
                let req = req.clone();
                async move { rpc.search_users(ctx, req).await }
            })
            .await?;
        Ok(into_page(list, &page))
    }

    pub async fn update_account_status(
        &self,
        ctx: &CallContext,
        id: i64,
        status: AccountStatus,
    ) -> Result<AccountProjection, AccountError> {
        self.execute(ctx, RpcOperation::UpdateAccountStatus, false, |rpc| async move {
            rpc.update_account_status(ctx, UpdateAccountStatusRequest { id, status })
                .await
        })
        .await
        .map(AccountRecord::into_projection)
    }

    // ── Password & email lifecycle ──────────────────────────────────

    pub async fn change_password(&self, ctx: &CallContext, req: ChangePasswordRequest) -> Result<Ack, AccountError> {
        self.execute(ctx, RpcOperation::ChangePassword, false, |rpc| {
            let req = req.clone();
            async move { rpc.change_password(ctx, req).await }
        })
        .await
    }

    pub async fn forgot_password(&self, ctx: &CallContext, email: &str) -> Result<Ack, AccountError> {
        self.execute(ctx, RpcOperation::ForgotPassword, false, |rpc| {
            let req = ForgotPasswordRequest {
                email: email.to_string(),
            };
            async move { rpc.forgot_password(ctx, req).await }
        })
        .await
    }

    pub async fn reset_password(&self, ctx: &CallContext, req: ResetPasswordRequest) -> Result<Ack, AccountError> {
        self.execute(ctx, RpcOperation::ResetPassword, false, |rpc| {
            let req = req.clone();
            async move { rpc.reset_password(ctx, req).await }
        })
        .await
    }

    pub async fn verify_email(&self, ctx: &CallContext, req: VerifyEmailRequest) -> Result<Ack, AccountError> {
        self.execute(ctx, RpcOperation::VerifyEmail, false, |rpc| {
            let req = req.clone();
            async move { rpc.verify_email(ctx, req).await }
        })
        .await
    }

    pub async fn resend_verification(&self, ctx: &CallContext, email: &str) -> Result<Ack, AccountError> {
        self.execute(ctx, RpcOperation::ResendVerification, false, |rpc| {
            let req = ResendVerificationRequest {
                email: email.to_string(),
            };
            async move { rpc.resend_verification(ctx, req).await }
        })
        .await
    }
}

fn into_page(list: AccountList, page: &PageRequest) -> AccountPage {
    AccountPage {
        users: list
            .accounts
            .into_iter()
            .map(AccountRecord::into_projection)
            .collect(),
        pagination: PageInfo::new(list.total, page.page, page.page_size),
    }
}
