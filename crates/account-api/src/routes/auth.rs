//! # Authentication Routes
//!
//! Registration, login, logout and token endpoints under `/accounts/auth`.
//! All are public; token validation reads the bearer header itself.
//!
//! Login failures answer with one generic message whether the email is
//! unknown or the password is wrong. The failed-attempt counter is keyed by
//! email and locks further attempts once it reaches the configured maximum.

use account_client::types::{LoginRequest, LogoutRequest, RefreshTokenRequest, RegisterRequest, ValidateTokenRequest};
use account_core::masking::mask_email;
use account_core::{AccountError, AccountStatus};
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::post;
use axum::Router;

use crate::auth::invalid_token;
use crate::config::AccountConfig;
use crate::dto::{
    LoginBody, LoginResponse, LogoutBody, MessageResponse, RefreshTokenBody, RegisterBody, RegisterResponse,
    TokenResponse, ValidateTokenResponse,
};
use crate::extractors::{bearer_token, decode_body, idempotency_key, DecodeOptions, RequestContext};
use crate::login_guard::Gate;
use crate::logging::{self, Severity};
use crate::pipeline::Operation;
use crate::routes::duplicate_email;
use crate::state::AppState;
use crate::validation::email_domain;

const TOKEN_TYPE: &str = "Bearer";

/// Free-mail providers refused when business email is required.
const FREE_MAIL_DOMAINS: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "live.com",
    "aol.com",
    "icloud.com",
    "mail.com",
    "gmx.com",
    "proton.me",
    "protonmail.com",
    "yandex.com",
];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/refresh-token", post(refresh_token))
        .route("/auth/validate-token", post(validate_token))
}

// ---------------------------------------------------------------------------
// Register
// ---------------------------------------------------------------------------

/// Registration restrictions from configuration. Both default to off.
fn check_email_policy(config: &AccountConfig, domain: &'static str, email: &str) -> Result<(), AccountError> {
    let Some(email_host) = email_domain(email) else {
        return Ok(());
    };
    if !config.allowed_email_domains.is_empty()
        && !config
            .allowed_email_domains
            .iter()
            .any(|d| d.eq_ignore_ascii_case(&email_host))
    {
        return Err(AccountError::business_rule(
            domain,
            "email_domain_not_allowed",
            "Registration is not open for this email domain",
        )
        .with_detail("email_domain", email_host));
    }
    if config.business_email_required && FREE_MAIL_DOMAINS.contains(&email_host.as_str()) {
        return Err(AccountError::business_rule(
            domain,
            "business_email_required",
            "Please register with a business email address",
        )
        .with_detail("email_domain", email_host));
    }
    Ok(())
}

/// Register a new account.
#[utoipa::path(
    post,
    path = "/accounts/auth/register",
    request_body = RegisterBody,
    params(("Idempotency-Key" = Option<String>, Header, description = "Makes the backend call safe to retry")),
    responses(
        (status = 201, description = "Account registered", body = RegisterResponse),
        (status = 400, description = "Malformed body or failed validation"),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Email domain refused by policy"),
        (status = 503, description = "Account backend unavailable"),
    ),
    tag = "auth"
)]
pub async fn register(State(state): State<AppState>, ctx: RequestContext, headers: HeaderMap, body: Body) -> Response {
    let op = Operation::start("register_user", &ctx);
    let result = register_user(&state, &ctx, &headers, body).await;
    op.respond(StatusCode::CREATED, result)
}

async fn register_user(
    state: &AppState,
    ctx: &RequestContext,
    headers: &HeaderMap,
    body: Body,
) -> Result<RegisterResponse, AccountError> {
    let idempotency_key = idempotency_key(headers)?;
    let body: RegisterBody = decode_body(body, DecodeOptions::new(state.body_limit())).await?;
    let call = ctx.call_context();
    state.validator.validate(&call, ctx.domain, &body).await?;

    let email = body.email.trim().to_string();
    check_email_policy(&state.config, ctx.domain, &email)?;

    let request = RegisterRequest {
        name: body.name.trim().to_string(),
        email: email.clone(),
        password: body.password,
        idempotency_key,
    };
    let reply = state
        .backend()?
        .register(&call, request)
        .await
        .map_err(|err| if err.is_conflict() { duplicate_email(ctx.domain, &email, err) } else { err })?;

    logging::user_activity(reply.id, "register", None);
    Ok(RegisterResponse {
        id: reply.id,
        name: reply.name,
        email: reply.email,
        success: reply.success,
        message: "User registered successfully".to_string(),
    })
}

// ---------------------------------------------------------------------------
// Login / logout
// ---------------------------------------------------------------------------

fn invalid_credentials(domain: &'static str) -> AccountError {
    AccountError::authentication(domain, "invalid_credentials")
        .with_code("invalid_credentials")
        .with_message("invalid email or password")
}

/// Exchange credentials for a session.
#[utoipa::path(
    post,
    path = "/accounts/auth/login",
    request_body = LoginBody,
    responses(
        (status = 200, description = "Session issued", body = LoginResponse),
        (status = 400, description = "Malformed body or failed validation"),
        (status = 401, description = "Invalid credentials or account locked"),
        (status = 422, description = "Account inactive or email unverified"),
    ),
    tag = "auth"
)]
pub async fn login(State(state): State<AppState>, ctx: RequestContext, body: Body) -> Response {
    let op = Operation::start("login_user", &ctx);
    let result = login_user(&state, &ctx, body).await;
    op.respond(StatusCode::OK, result)
}

async fn login_user(state: &AppState, ctx: &RequestContext, body: Body) -> Result<LoginResponse, AccountError> {
    let body: LoginBody = decode_body(body, DecodeOptions::new(state.body_limit())).await?;
    let call = ctx.call_context();
    state.validator.validate(&call, ctx.domain, &body).await?;
    let email = body.email.trim().to_string();

    if let Gate::Locked { retry_after } = state.login_attempts.check(&email).await {
        logging::auth_attempt(&email, false, "account_locked");
        logging::security_event(
            "account_locked",
            Severity::High,
            &format!("login refused for {} while locked out", mask_email(&email)),
        );
        return Err(AccountError::authentication(ctx.domain, "account_locked")
            .with_code("account_locked")
            .with_message("too many failed login attempts, try again later")
            .with_detail("retry_after_secs", retry_after.as_secs().max(1)));
    }

    let request = LoginRequest {
        email: email.clone(),
        password: body.password,
    };
    let session = match state.backend()?.login(&call, request).await {
        Ok(session) => session,
        Err(err) if err.is_authentication() || err.is_not_found() => {
            let failures = state.login_attempts.record_failure(&email).await;
            logging::auth_attempt(&email, false, "password_mismatch");
            logging::security_event(
                "failed_login_attempt",
                Severity::Medium,
                &format!("{failures} consecutive failure(s) for {}", mask_email(&email)),
            );
            return Err(invalid_credentials(ctx.domain).with_cause(err));
        }
        Err(err) => return Err(err),
    };

    if session.status != AccountStatus::Active {
        logging::auth_attempt(&email, false, "account_inactive");
        return Err(AccountError::business_rule(
            ctx.domain,
            "account_inactive",
            "This account is not active",
        )
        .with_detail("status", session.status.as_str()));
    }
    if state.config.email_verification_required && !session.email_verified {
        logging::auth_attempt(&email, false, "email_unverified");
        return Err(AccountError::business_rule(
            ctx.domain,
            "account_unverified",
            "Please verify your email address before signing in",
        ));
    }

    state.login_attempts.clear(&email).await;
    logging::auth_attempt(&email, true, "ok");
    logging::security_event(
        "user_login_success",
        Severity::Low,
        &format!("user {} signed in", session.account.id),
    );
    logging::user_activity(session.account.id, "login", None);

    Ok(LoginResponse {
        access_token: session.tokens.access_token.expose().to_string(),
        refresh_token: session.tokens.refresh_token.expose().to_string(),
        expires_at: session.tokens.expires_at,
        token_type: TOKEN_TYPE.to_string(),
        user: session.account,
    })
}

/// End a session. Always succeeds for unknown or already revoked tokens.
#[utoipa::path(
    post,
    path = "/accounts/auth/logout",
    request_body(content = LogoutBody, description = "Optional; revokes the refresh token when given"),
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 400, description = "Malformed body"),
    ),
    tag = "auth"
)]
pub async fn logout(State(state): State<AppState>, ctx: RequestContext, body: Body) -> Response {
    let op = Operation::start("logout_user", &ctx);
    let result = logout_user(&state, &ctx, body).await;
    op.respond(StatusCode::OK, result)
}

async fn logout_user(state: &AppState, ctx: &RequestContext, body: Body) -> Result<MessageResponse, AccountError> {
    let body: LogoutBody = decode_body(body, DecodeOptions::new(state.body_limit()).allow_empty()).await?;
    let call = ctx.call_context();
    let request = LogoutRequest {
        refresh_token: body.refresh_token.filter(|t| !t.is_empty()),
    };
    match state.backend()?.logout(&call, request).await {
        Ok(_) => {}
        Err(err) if err.is_authentication() || err.is_not_found() => {
            tracing::debug!(code = err.code(), "logout with an unknown refresh token");
        }
        Err(err) => return Err(err),
    }
    Ok(MessageResponse::new("Logged out successfully"))
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Exchange a refresh token for a new token pair.
#[utoipa::path(
    post,
    path = "/accounts/auth/refresh-token",
    request_body = RefreshTokenBody,
    responses(
        (status = 200, description = "New token pair", body = TokenResponse),
        (status = 400, description = "Malformed body"),
        (status = 401, description = "Refresh token invalid or expired"),
    ),
    tag = "auth"
)]
pub async fn refresh_token(State(state): State<AppState>, ctx: RequestContext, body: Body) -> Response {
    let op = Operation::start("refresh_token", &ctx);
    let result = refresh_session(&state, &ctx, body).await;
    op.respond(StatusCode::OK, result)
}

async fn refresh_session(state: &AppState, ctx: &RequestContext, body: Body) -> Result<TokenResponse, AccountError> {
    let body: RefreshTokenBody = decode_body(body, DecodeOptions::new(state.body_limit())).await?;
    let call = ctx.call_context();
    state.validator.validate(&call, ctx.domain, &body).await?;
    let pair = state
        .backend()?
        .refresh_token(&call, RefreshTokenRequest { refresh_token: body.refresh_token })
        .await
        .map_err(|err| if err.is_authentication() {
            invalid_token("refresh_rejected")
                .with_message("the refresh token is invalid or has expired")
                .with_cause(err)
        } else { err })?;
    Ok(TokenResponse {
        access_token: pair.access_token.expose().to_string(),
        refresh_token: pair.refresh_token.expose().to_string(),
        expires_at: pair.expires_at,
        token_type: TOKEN_TYPE.to_string(),
    })
}

/// Check the bearer token and report its subject.
#[utoipa::path(
    post,
    path = "/accounts/auth/validate-token",
    responses(
        (status = 200, description = "Validation result", body = ValidateTokenResponse),
        (status = 401, description = "Header missing or malformed, or token rejected"),
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn validate_token(State(state): State<AppState>, ctx: RequestContext, headers: HeaderMap) -> Response {
    let op = Operation::start("validate_token", &ctx);
    let result = check_token(&state, &ctx, &headers).await;
    op.respond(StatusCode::OK, result)
}

async fn check_token(
    state: &AppState,
    ctx: &RequestContext,
    headers: &HeaderMap,
) -> Result<ValidateTokenResponse, AccountError> {
    let token = bearer_token(headers).map_err(|err| {
        logging::security_event("missing_credentials", Severity::Low, err.code());
        err
    })?;
    let reply = state
        .backend()?
        .validate_token(&ctx.call_context(), ValidateTokenRequest { token })
        .await
        .map_err(|err| if err.is_authentication() { invalid_token("rejected").with_cause(err) } else { err })?;
    Ok(ValidateTokenResponse {
        valid: reply.valid,
        id: reply.user_id,
        expires_at: reply.expires_at,
        message: reply.message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_policy_defaults_allow_everything() {
        let config = AccountConfig::default();
        assert!(check_email_policy(&config, "account", "ada@gmail.com").is_ok());
    }

    #[test]
    fn allow_list_is_case_insensitive() {
        let config = AccountConfig {
            allowed_email_domains: vec!["School.edu".to_string()],
            ..AccountConfig::default()
        };
        assert!(check_email_policy(&config, "account", "ada@school.EDU").is_ok());
        let err = check_email_policy(&config, "account", "ada@other.org").unwrap_err();
        assert_eq!(err.code(), "email_domain_not_allowed");
        assert_eq!(err.http_status(), 422);
    }

    #[test]
    fn business_email_rule_refuses_free_mail() {
        let config = AccountConfig {
            business_email_required: true,
            ..AccountConfig::default()
        };
        let err = check_email_policy(&config, "account", "ada@gmail.com").unwrap_err();
        assert_eq!(err.code(), "business_email_required");
        assert!(check_email_policy(&config, "account", "ada@acme.io").is_ok());
    }

    #[test]
    fn duplicate_email_carries_suggestion() {
        let cause = AccountError::conflict("account", "account", "email", "x");
        let err = duplicate_email("account", "ada@acme.io", cause);
        assert_eq!(err.code(), "duplicate_email");
        assert!(err.details().contains_key("suggestion"));
        assert_ne!(err.details()["email"], "ada@acme.io");
    }
}
