//! # OpenAPI Document
//!
//! Assembles the utoipa-documented handlers into one OpenAPI 3.1 document,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the Bearer token security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some("Access token issued by POST /accounts/auth/login."))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Account Service API",
        version = "0.1.0",
        description = "HTTP edge of the account service: registration, sessions, password and email lifecycle, account management and search.\n\nEvery response is an envelope: `{success, request_id, data}` on success, `{success, request_id, error: {code, message, kind, domain, details}}` on failure. `X-Request-Id` is honored and echoed."
    ),
    paths(
        // ── Authentication ──────────────────────────────────────────────
        crate::routes::auth::register,
        crate::routes::auth::login,
        crate::routes::auth::logout,
        crate::routes::auth::refresh_token,
        crate::routes::auth::validate_token,
        // ── Password ────────────────────────────────────────────────────
        crate::routes::password::forgot_password,
        crate::routes::password::reset_password,
        crate::routes::password::change_password,
        // ── Email ───────────────────────────────────────────────────────
        crate::routes::email::verify_email,
        crate::routes::email::resend_verification,
        // ── Accounts ────────────────────────────────────────────────────
        crate::routes::users::get_profile,
        crate::routes::users::get_profile_by_id,
        crate::routes::users::get_user,
        crate::routes::users::list_users,
        crate::routes::users::create_user,
        crate::routes::users::update_user,
        crate::routes::users::delete_user,
        // ── Search ──────────────────────────────────────────────────────
        crate::routes::search::search_users,
        crate::routes::search::find_by_email,
        crate::routes::search::find_by_role,
        crate::routes::search::branch_summary,
        crate::routes::search::branch_users,
        // ── Management ──────────────────────────────────────────────────
        crate::routes::manage::update_account_status,
    ),
    components(
        schemas(
            account_core::AccountProjection,
            account_core::AccountPage,
            account_core::PageInfo,
            account_core::Role,
            account_core::AccountStatus,
            account_core::ErrorKind,
            account_core::envelope::ErrorBody,
            account_core::ErrorEnvelope,
            crate::dto::RegisterBody,
            crate::dto::LoginBody,
            crate::dto::LogoutBody,
            crate::dto::RefreshTokenBody,
            crate::dto::ChangePasswordBody,
            crate::dto::ForgotPasswordBody,
            crate::dto::ResetPasswordBody,
            crate::dto::ResendVerificationBody,
            crate::dto::CreateUserBody,
            crate::dto::UpdateUserBody,
            crate::dto::UpdateStatusBody,
            crate::dto::RegisterResponse,
            crate::dto::LoginResponse,
            crate::dto::TokenResponse,
            crate::dto::ValidateTokenResponse,
            crate::dto::MessageResponse,
            crate::dto::BranchSummary,
            crate::dto::StatusUpdateResponse,
        ),
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration, login, logout and tokens"),
        (name = "password", description = "Forgot, reset and change password"),
        (name = "email", description = "Email verification"),
        (name = "users", description = "Profiles and account management"),
        (name = "search", description = "Search, lookups and branch views"),
        (name = "manage", description = "Account status administration"),
    )
)]
pub struct ApiDoc;

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_builds() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "Account Service API");
        assert!(spec
            .components
            .as_ref()
            .is_some_and(|c| c.security_schemes.contains_key("bearer_auth")));
    }

    #[test]
    fn documents_account_paths() {
        let spec = ApiDoc::openapi();
        for path in [
            "/accounts/auth/register",
            "/accounts/auth/validate-token",
            "/accounts/password/change",
            "/accounts/email/verify/{token}",
            "/accounts",
            "/accounts/{id}",
            "/accounts/search",
            "/accounts/branch/{branch_id}/users",
            "/accounts/manage/{id}/status",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
