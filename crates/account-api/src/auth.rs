//! # Authentication Middleware
//!
//! Resolves `Authorization: Bearer <token>` into a [`CallerIdentity`] and
//! stores it in the request extensions for the protected route group.
//! Handlers read it back through [`crate::extractors::RequestContext`].
//!
//! Token semantics belong to the account backend: the default
//! [`BackendTokenVerifier`] asks it to validate the token and then loads the
//! caller's projection to learn the role. Tests substitute a
//! [`TokenVerifier`] of their own through [`crate::state::AppState`].

use std::sync::Arc;

use account_client::types::ValidateTokenRequest;
use account_client::{AccountBackend, CallContext};
use account_core::masking::token_fingerprint;
use account_core::{AccountError, Role, Secret, DOMAIN_ACCOUNT};
use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::render_error;
use crate::extractors::{bearer_token, RequestId};
use crate::logging::{self, Severity};
use crate::state::AppState;

/// Identity of the authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: i64,
    pub email: Option<String>,
    pub role: Option<Role>,
}

impl CallerIdentity {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            email: None,
            role: None,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Role used for authorization. A caller without a role gets the lowest.
    pub fn effective_role(&self) -> Role {
        self.role.unwrap_or(Role::Student)
    }

    pub fn is_admin(&self) -> bool {
        self.effective_role() == Role::Admin
    }
}

/// Turns a bearer token into a caller identity.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, ctx: &CallContext, token: &Secret) -> Result<CallerIdentity, AccountError>;
}

/// Verifies tokens against the account backend.
#[derive(Debug, Clone)]
pub struct BackendTokenVerifier {
    backend: AccountBackend,
}

impl BackendTokenVerifier {
    pub fn new(backend: AccountBackend) -> Self {
        Self { backend }
    }
}

/// Authentication failure for a rejected or expired token.
pub(crate) fn invalid_token(reason: &str) -> AccountError {
    AccountError::authentication(DOMAIN_ACCOUNT, reason)
        .with_code("invalid_token")
        .with_message("the access token is invalid or has expired")
}

#[async_trait]
impl TokenVerifier for BackendTokenVerifier {
    async fn verify(&self, ctx: &CallContext, token: &Secret) -> Result<CallerIdentity, AccountError> {
        let reply = self
            .backend
            .validate_token(ctx, ValidateTokenRequest { token: token.clone() })
            .await
            .map_err(|err| if err.is_authentication() { invalid_token("rejected") } else { err })?;
        if !reply.valid || reply.user_id <= 0 {
            return Err(invalid_token("not_valid"));
        }
        let account = self
            .backend
            .find_by_id(ctx, reply.user_id)
            .await
            .map_err(|err| if err.is_not_found() { invalid_token("subject_missing") } else { err })?;
        Ok(CallerIdentity::new(account.id)
            .with_email(account.email)
            .with_role(account.role))
    }
}

/// Middleware for the protected group. Rejects with 401 when the header is
/// missing, malformed, or the token does not verify.
pub async fn auth_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();

    let token = match bearer_token(request.headers()) {
        Ok(token) => token,
        Err(err) => {
            logging::security_event("missing_credentials", Severity::Low, err.code());
            logging::error(&err);
            return render_error(&request_id, &err);
        }
    };

    let verifier = match state.verifier() {
        Ok(verifier) => Arc::clone(verifier),
        Err(err) => {
            logging::error(&err);
            return render_error(&request_id, &err);
        }
    };
    let ctx = CallContext::new(request_id.clone());
    match verifier.verify(&ctx, &token).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => {
            if err.is_authentication() {
                let detail = format!("token {}", token_fingerprint(token.expose()));
                logging::security_event("invalid_token", Severity::Medium, &detail);
            }
            logging::error(&err);
            render_error(&request_id, &err)
        }
    }
}
