//! Password lifecycle: forgot and reset are public, change needs a caller.
//!
//! Forgot-password answers identically whether or not the email exists,
//! and whatever the backend replies.

use account_client::types::{ChangePasswordRequest, ResetPasswordRequest};
use account_core::masking::mask_email;
use account_core::AccountError;
use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{post, put};
use axum::Router;

use crate::auth::invalid_token;
use crate::dto::{ChangePasswordBody, ForgotPasswordBody, MessageResponse, ResetPasswordBody};
use crate::extractors::{decode_body, DecodeOptions, RequestContext};
use crate::logging::{self, Severity};
use crate::pipeline::Operation;
use crate::state::AppState;

const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists for this email, password reset instructions have been sent";

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/password/forgot", post(forgot_password))
        .route("/password/reset", post(reset_password))
}

pub fn protected_router() -> Router<AppState> {
    Router::new().route("/password/change", put(change_password))
}

/// Start a password reset.
#[utoipa::path(
    post,
    path = "/accounts/password/forgot",
    request_body = ForgotPasswordBody,
    responses(
        (status = 200, description = "Generic acknowledgement", body = MessageResponse),
        (status = 400, description = "Malformed body or invalid email"),
    ),
    tag = "password"
)]
pub async fn forgot_password(State(state): State<AppState>, ctx: RequestContext, body: Body) -> Response {
    let op = Operation::start("forgot_password", &ctx);
    let result = request_reset(&state, &ctx, body).await;
    op.respond(StatusCode::OK, result)
}

async fn request_reset(state: &AppState, ctx: &RequestContext, body: Body) -> Result<MessageResponse, AccountError> {
    let body: ForgotPasswordBody = decode_body(body, DecodeOptions::new(state.body_limit())).await?;
    let call = ctx.call_context();
    state.validator.validate(&call, ctx.domain, &body).await?;
    let email = body.email.trim();
    // Every backend outcome answers the same way; only the logs differ.
    match state.backend()?.forgot_password(&call, email).await {
        Ok(_) => {}
        Err(err) if err.is_not_found() => {
            logging::security_event(
                "password_reset_unknown_email",
                Severity::Low,
                &format!("reset requested for {}", mask_email(email)),
            );
        }
        Err(err) => logging::error(&err.with_operation("forgot_password")),
    }
    Ok(MessageResponse::new(FORGOT_PASSWORD_MESSAGE))
}

/// Complete a password reset with the emailed token.
#[utoipa::path(
    post,
    path = "/accounts/password/reset",
    request_body = ResetPasswordBody,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid token or weak password"),
    ),
    tag = "password"
)]
pub async fn reset_password(State(state): State<AppState>, ctx: RequestContext, body: Body) -> Response {
    let op = Operation::start("reset_password", &ctx);
    let result = complete_reset(&state, &ctx, body).await;
    op.respond(StatusCode::OK, result)
}

async fn complete_reset(state: &AppState, ctx: &RequestContext, body: Body) -> Result<MessageResponse, AccountError> {
    let body: ResetPasswordBody = decode_body(body, DecodeOptions::new(state.body_limit())).await?;
    let call = ctx.call_context();
    state.validator.validate(&call, ctx.domain, &body).await?;
    let request = ResetPasswordRequest {
        token: body.token,
        new_password: body.new_password,
    };
    state.backend()?.reset_password(&call, request).await.map_err(|err| {
        if err.is_validation() || err.is_not_found() {
            AccountError::validation(ctx.domain, "token", "reset token is invalid or has expired")
                .with_code("invalid_token")
                .with_cause(err)
        } else if err.is_authentication() {
            invalid_token("reset_rejected")
                .with_message("reset token is invalid or has expired")
                .with_cause(err)
        } else {
            err
        }
    })?;
    logging::security_event("password_reset_completed", Severity::Low, "password reset with token");
    Ok(MessageResponse::new("Password has been reset successfully"))
}

/// Change the caller's password.
#[utoipa::path(
    put,
    path = "/accounts/password/change",
    request_body = ChangePasswordBody,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Weak or reused password"),
        (status = 401, description = "Not authenticated or current password wrong"),
    ),
    security(("bearer_auth" = [])),
    tag = "password"
)]
pub async fn change_password(State(state): State<AppState>, ctx: RequestContext, body: Body) -> Response {
    let op = Operation::start("change_password", &ctx);
    let result = change_own_password(&state, &ctx, body).await;
    op.respond(StatusCode::OK, result)
}

async fn change_own_password(
    state: &AppState,
    ctx: &RequestContext,
    body: Body,
) -> Result<MessageResponse, AccountError> {
    let user_id = ctx.user_id()?;
    let body: ChangePasswordBody = decode_body(body, DecodeOptions::new(state.body_limit())).await?;
    let call = ctx.call_context();
    state.validator.validate(&call, ctx.domain, &body).await?;
    if body.current_password == body.new_password {
        return Err(AccountError::validation(
            ctx.domain,
            "new_password",
            "New password must be different from the current password",
        )
        .with_code("password_reuse"));
    }

    let request = ChangePasswordRequest {
        user_id,
        current_password: body.current_password,
        new_password: body.new_password,
    };
    state.backend()?.change_password(&call, request).await.map_err(|err| {
        if err.is_authentication() {
            logging::security_event(
                "password_change_rejected",
                Severity::Medium,
                &format!("wrong current password for user {user_id}"),
            );
            AccountError::authentication(ctx.domain, "invalid_current_password")
                .with_code("invalid_current_password")
                .with_message("current password is incorrect")
                .with_cause(err)
        } else {
            err
        }
    })?;
    logging::security_event("password_changed", Severity::Low, &format!("user {user_id} changed their password"));
    logging::user_activity(user_id, "change_password", None);
    Ok(MessageResponse::new("Password changed successfully"))
}
