//! # `/accounts` Route Modules
//!
//! - `auth`: registration, login, logout, token refresh and validation
//! - `password`: forgot, reset (public) and change (authenticated)
//! - `email`: verification by path token, resend by body email
//! - `users`: profile reads, list, create, update, delete
//! - `search`: filtered search, lookup by email or role, branch views
//! - `manage`: account status administration
//!
//! Public and protected routes are merged into one router; only the
//! protected half passes through [`crate::auth::auth_middleware`]. Every
//! handler opens an [`crate::pipeline::Operation`] and answers through it.

pub mod auth;
pub mod email;
pub mod manage;
pub mod password;
pub mod search;
pub mod users;

use account_core::{AccountError, Role};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::Router;

use crate::auth::auth_middleware;
use crate::middleware::context::domain_middleware;
use crate::middleware::rate_limit::rate_limit_middleware;
use crate::state::AppState;

/// Mount point of the account routes.
pub const ACCOUNTS_PREFIX: &str = "/accounts";

/// Sortable columns of account listings.
pub const SORT_FIELDS: &[&str] = &["id", "name", "email", "role", "created_at", "updated_at"];
pub const DEFAULT_SORT_FIELD: &str = "created_at";

/// Backend conflict on `email`, re-raised with a next step for the client.
pub(crate) fn duplicate_email(domain: &'static str, email: &str, cause: AccountError) -> AccountError {
    AccountError::conflict(domain, "user", "email", email)
        .with_message("Email address is already registered")
        .with_detail("suggestion", "Sign in, or reset your password if you have forgotten it")
        .with_cause(cause)
}

/// Role name from a body, query or path value.
pub(crate) fn parse_role(domain: &'static str, field: &str, raw: &str) -> Result<Role, AccountError> {
    raw.trim().to_ascii_lowercase().parse::<Role>().map_err(|_| {
        AccountError::validation(domain, field, format!("Role must be one of: {}", Role::NAMES.join(", ")))
            .with_code("invalid_role")
    })
}

/// All account routes, relative to [`ACCOUNTS_PREFIX`].
pub fn accounts(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .merge(auth::router())
        .merge(password::public_router())
        .merge(email::router());

    let protected = Router::new()
        .merge(password::protected_router())
        .merge(users::router())
        .merge(search::router())
        .merge(manage::router())
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(from_fn(domain_middleware))
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
}
