//! Email verification routes. The token travels only in the path; resend
//! takes the email only in the body and answers generically.

use account_client::types::VerifyEmailRequest;
use account_core::masking::mask_email;
use account_core::{AccountError, Secret};
use axum::body::Body;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;

use crate::dto::{MessageResponse, ResendVerificationBody};
use crate::extractors::{decode_body, parse_string, path_param, DecodeOptions, RequestContext};
use crate::logging::{self, Severity};
use crate::pipeline::Operation;
use crate::state::AppState;

const MAX_TOKEN_LEN: usize = 512;

const RESEND_VERIFICATION_MESSAGE: &str =
    "If an unverified account exists for this email, a verification email has been sent";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/email/verify/{token}", get(verify_email))
        .route("/email/resend-verification", post(resend_verification))
}

/// Confirm an email address with the token from the verification mail.
#[utoipa::path(
    get,
    path = "/accounts/email/verify/{token}",
    params(("token" = String, Path, description = "Verification token")),
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Token malformed, invalid or expired"),
    ),
    tag = "email"
)]
pub async fn verify_email(
    State(state): State<AppState>,
    ctx: RequestContext,
    token: Result<Path<String>, PathRejection>,
) -> Response {
    let op = Operation::start("verify_email", &ctx);
    let result = confirm_email(&state, &ctx, token).await;
    op.respond(StatusCode::OK, result)
}

async fn confirm_email(
    state: &AppState,
    ctx: &RequestContext,
    token: Result<Path<String>, PathRejection>,
) -> Result<MessageResponse, AccountError> {
    let token = parse_string("token", &path_param("token", token)?, 1, MAX_TOKEN_LEN)?;
    let request = VerifyEmailRequest {
        token: Secret::new(token),
    };
    state
        .backend()?
        .verify_email(&ctx.call_context(), request)
        .await
        .map_err(|err| {
            if err.is_validation() || err.is_not_found() || err.is_authentication() {
                logging::security_event("invalid_verification_token", Severity::Low, "email verification refused");
                AccountError::validation(ctx.domain, "token", "verification token is invalid or has expired")
                    .with_code("invalid_token")
                    .with_cause(err)
            } else {
                err
            }
        })?;
    Ok(MessageResponse::new("Email verified successfully"))
}

/// Send a fresh verification email.
#[utoipa::path(
    post,
    path = "/accounts/email/resend-verification",
    request_body = ResendVerificationBody,
    responses(
        (status = 200, description = "Generic acknowledgement", body = MessageResponse),
        (status = 400, description = "Malformed body or invalid email"),
    ),
    tag = "email"
)]
pub async fn resend_verification(State(state): State<AppState>, ctx: RequestContext, body: Body) -> Response {
    let op = Operation::start("resend_verification", &ctx);
    let result = resend(&state, &ctx, body).await;
    op.respond(StatusCode::OK, result)
}

async fn resend(state: &AppState, ctx: &RequestContext, body: Body) -> Result<MessageResponse, AccountError> {
    let body: ResendVerificationBody = decode_body(body, DecodeOptions::new(state.body_limit())).await?;
    let call = ctx.call_context();
    state.validator.validate(&call, ctx.domain, &body).await?;
    let email = body.email.trim();
    match state.backend()?.resend_verification(&call, email).await {
        Ok(_) => {}
        Err(err) if err.is_not_found() => {
            logging::security_event(
                "verification_resend_unknown_email",
                Severity::Low,
                &format!("resend requested for {}", mask_email(email)),
            );
        }
        Err(err) if err.is_business_rule() => {
            tracing::debug!(email = %mask_email(email), code = err.code(), "verification resend skipped");
        }
        Err(err) => logging::error(&err.with_operation("resend_verification")),
    }
    Ok(MessageResponse::new(RESEND_VERIFICATION_MESSAGE))
}
