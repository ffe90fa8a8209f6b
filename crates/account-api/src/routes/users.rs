//! # Account Routes
//!
//! Profile reads, listing and CRUD under `/accounts`. All authenticated.
//!
//! | Route | Allowed |
//! |---|---|
//! | `GET /profile` | any caller, own account |
//! | `GET /profile/{id}`, `GET /{id}` | self, or teacher and above |
//! | `GET /` | teacher and above |
//! | `POST /` | teacher and above; roles above student need admin |
//! | `PUT /{id}` | self, admin, or a teacher who owns the account |
//! | `DELETE /{id}` | admin, never on self |

use account_client::types::{CreateUserRequest, ListUsersRequest, UpdateUserRequest};
use account_core::{AccountError, AccountPage, AccountProjection, Role};
use axum::body::Body;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::Router;

use crate::dto::{CreateUserBody, UpdateUserBody};
use crate::extractors::{
    decode_body, idempotency_key, parse_page_request, path_id, query_map, DecodeOptions, RequestContext,
};
use crate::logging;
use crate::pipeline::Operation;
use crate::policy::{denied, forbid_role_escalation, has_role, is_owner_or_admin, require_role, require_self_or_role};
use crate::routes::{duplicate_email, parse_role, DEFAULT_SORT_FIELD, SORT_FIELDS};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/profile", get(get_profile))
        .route("/profile/{id}", get(get_profile_by_id))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// The caller's own account.
#[utoipa::path(
    get,
    path = "/accounts/profile",
    responses(
        (status = 200, description = "Caller's account", body = AccountProjection),
        (status = 401, description = "Not authenticated"),
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn get_profile(State(state): State<AppState>, ctx: RequestContext) -> Response {
    let op = Operation::start("get_profile", &ctx);
    let result = own_profile(&state, &ctx).await;
    op.respond(StatusCode::OK, result)
}

async fn own_profile(state: &AppState, ctx: &RequestContext) -> Result<AccountProjection, AccountError> {
    let user_id = ctx.user_id()?;
    state.backend()?.find_by_id(&ctx.call_context(), user_id).await
}

/// Another account's profile.
#[utoipa::path(
    get,
    path = "/accounts/profile/{id}",
    params(("id" = i64, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account", body = AccountProjection),
        (status = 400, description = "Malformed id"),
        (status = 403, description = "Caller may not view this account"),
        (status = 404, description = "No such account"),
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn get_profile_by_id(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: Result<Path<String>, PathRejection>,
) -> Response {
    let op = Operation::start("get_profile_by_id", &ctx);
    let result = visible_account(&state, &ctx, id).await;
    op.respond(StatusCode::OK, result)
}

/// One account by id.
#[utoipa::path(
    get,
    path = "/accounts/{id}",
    params(("id" = i64, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account", body = AccountProjection),
        (status = 400, description = "Malformed id"),
        (status = 403, description = "Caller may not view this account"),
        (status = 404, description = "No such account"),
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: Result<Path<String>, PathRejection>,
) -> Response {
    let op = Operation::start("find_user_by_id", &ctx);
    let result = visible_account(&state, &ctx, id).await;
    op.respond(StatusCode::OK, result)
}

async fn visible_account(
    state: &AppState,
    ctx: &RequestContext,
    id: Result<Path<String>, PathRejection>,
) -> Result<AccountProjection, AccountError> {
    let caller = ctx.caller()?;
    let id = path_id("id", id)?;
    require_self_or_role(caller, id, Role::Teacher, "view", "user")?;
    state.backend()?.find_by_id(&ctx.call_context(), id).await
}

/// Page through all accounts.
#[utoipa::path(
    get,
    path = "/accounts",
    params(
        ("page" = Option<u32>, Query, description = "Page number, from 1"),
        ("page_size" = Option<u32>, Query, description = "1 to 100, default 10"),
        ("sort_by" = Option<String>, Query, description = "id, name, email, role, created_at or updated_at"),
        ("sort_order" = Option<String>, Query, description = "asc or desc"),
    ),
    responses(
        (status = 200, description = "Accounts", body = AccountPage),
        (status = 400, description = "Invalid pagination or sort"),
        (status = 403, description = "Teacher role required"),
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn list_users(State(state): State<AppState>, ctx: RequestContext, RawQuery(query): RawQuery) -> Response {
    let op = Operation::start("list_users", &ctx);
    let result = page_of_users(&state, &ctx, query.as_deref()).await;
    op.respond(StatusCode::OK, result)
}

async fn page_of_users(state: &AppState, ctx: &RequestContext, query: Option<&str>) -> Result<AccountPage, AccountError> {
    let caller = ctx.caller()?;
    require_role(caller, Role::Teacher, "list", "users")?;
    let page = parse_page_request(&query_map(query), SORT_FIELDS, DEFAULT_SORT_FIELD)?;
    state
        .backend()?
        .find_all_users(&ctx.call_context(), ListUsersRequest { page })
        .await
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Create an account on behalf of the caller.
#[utoipa::path(
    post,
    path = "/accounts",
    request_body = CreateUserBody,
    params(("Idempotency-Key" = Option<String>, Header, description = "Makes the backend call safe to retry")),
    responses(
        (status = 201, description = "Account created", body = AccountProjection),
        (status = 400, description = "Malformed body or failed validation"),
        (status = 403, description = "Role too low for this account"),
        (status = 409, description = "Email already registered"),
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let op = Operation::start("create_user", &ctx);
    let result = create_account(&state, &ctx, &headers, body).await;
    op.respond(StatusCode::CREATED, result)
}

async fn create_account(
    state: &AppState,
    ctx: &RequestContext,
    headers: &HeaderMap,
    body: Body,
) -> Result<AccountProjection, AccountError> {
    let caller = ctx.caller()?;
    require_role(caller, Role::Teacher, "create", "user")?;
    let idempotency_key = idempotency_key(headers)?;
    let body: CreateUserBody = decode_body(body, DecodeOptions::new(state.body_limit())).await?;
    let call = ctx.call_context();
    state.validator.validate(&call, ctx.domain, &body).await?;

    let role = parse_role(ctx.domain, "role", &body.role)?;
    forbid_role_escalation(caller, Some(role), Some(Role::Student))?;
    let owner_id = body.owner_id.unwrap_or(caller.user_id);
    if !is_owner_or_admin(caller, owner_id) {
        return Err(denied(caller, Role::Admin, "assign the owner of", "user"));
    }

    let email = body.email.trim().to_string();
    let request = CreateUserRequest {
        branch_id: body.branch_id,
        name: body.name.trim().to_string(),
        email: email.clone(),
        password: body.password,
        avatar: body.avatar.unwrap_or_default(),
        title: body.title.unwrap_or_default(),
        role,
        owner_id,
        idempotency_key,
    };
    let account = state
        .backend()?
        .create_user(&call, request)
        .await
        .map_err(|err| if err.is_conflict() { duplicate_email(ctx.domain, &email, err) } else { err })?;
    logging::user_activity(caller.user_id, "create_user", Some(account.id));
    Ok(account)
}

/// Update provided fields of an account.
#[utoipa::path(
    put,
    path = "/accounts/{id}",
    params(("id" = i64, Path, description = "Account id")),
    request_body = UpdateUserBody,
    responses(
        (status = 200, description = "Updated account", body = AccountProjection),
        (status = 400, description = "Empty update or failed validation"),
        (status = 403, description = "Caller may not update this account or role"),
        (status = 404, description = "No such account"),
        (status = 409, description = "Email already registered"),
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: Result<Path<String>, PathRejection>,
    body: Body,
) -> Response {
    let op = Operation::start("update_user", &ctx);
    let result = update_account(&state, &ctx, id, body).await;
    op.respond(StatusCode::OK, result)
}

async fn update_account(
    state: &AppState,
    ctx: &RequestContext,
    id: Result<Path<String>, PathRejection>,
    body: Body,
) -> Result<AccountProjection, AccountError> {
    let caller = ctx.caller()?;
    let target_id = path_id("id", id)?;
    let call = ctx.call_context();
    let backend = state.backend()?;

    // Role currently held by the target, when the caller is not an admin.
    let current_role = if caller.user_id == target_id {
        caller.role
    } else if caller.is_admin() {
        None
    } else if has_role(caller, Role::Teacher) {
        let target = backend.find_by_id(&call, target_id).await?;
        if !is_owner_or_admin(caller, target.owner_id) {
            return Err(denied(caller, Role::Admin, "update", "user"));
        }
        Some(target.role)
    } else {
        return Err(denied(caller, Role::Admin, "update", "user"));
    };

    let body: UpdateUserBody = decode_body(body, DecodeOptions::new(state.body_limit())).await?;
    if body.is_empty() {
        return Err(AccountError::validation(ctx.domain, "body", "at least one field must be provided")
            .with_code("empty_update"));
    }
    state.validator.validate(&call, ctx.domain, &body.checks(target_id)).await?;

    let role = body
        .role
        .as_deref()
        .map(|raw| parse_role(ctx.domain, "role", raw))
        .transpose()?;
    forbid_role_escalation(caller, role, current_role)?;
    if let Some(owner_id) = body.owner_id {
        if !caller.is_admin() {
            return Err(denied(caller, Role::Admin, "reassign the owner of", "user"));
        }
        if owner_id <= 0 {
            return Err(AccountError::validation(ctx.domain, "owner_id", "owner_id must be a positive integer")
                .with_code("invalid_owner_id"));
        }
    }

    let email = body.email.as_deref().map(|e| e.trim().to_string());
    let request = UpdateUserRequest {
        id: target_id,
        branch_id: body.branch_id,
        name: body.name.map(|n| n.trim().to_string()),
        email: email.clone(),
        avatar: body.avatar,
        title: body.title,
        role,
        owner_id: body.owner_id,
    };
    let account = backend.update_user(&call, request).await.map_err(|err| match &email {
        Some(email) if err.is_conflict() => duplicate_email(ctx.domain, email, err),
        _ => err,
    })?;
    logging::user_activity(caller.user_id, "update_user", Some(target_id));
    Ok(account)
}

/// Delete an account.
#[utoipa::path(
    delete,
    path = "/accounts/{id}",
    params(("id" = i64, Path, description = "Account id")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 400, description = "Malformed id"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "No such account"),
        (status = 422, description = "Callers cannot delete themselves"),
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: Result<Path<String>, PathRejection>,
) -> Response {
    let op = Operation::start("delete_user", &ctx);
    let result = delete_account(&state, &ctx, id).await;
    op.respond(StatusCode::NO_CONTENT, result)
}

async fn delete_account(
    state: &AppState,
    ctx: &RequestContext,
    id: Result<Path<String>, PathRejection>,
) -> Result<(), AccountError> {
    let caller = ctx.caller()?;
    let target_id = path_id("id", id)?;
    if caller.user_id == target_id {
        return Err(AccountError::business_rule(
            ctx.domain,
            "self_deletion",
            "You cannot delete your own account",
        ));
    }
    require_role(caller, Role::Admin, "delete", "user")?;
    state.backend()?.delete_user(&ctx.call_context(), target_id).await?;
    logging::user_activity(caller.user_id, "delete_user", Some(target_id));
    Ok(())
}
