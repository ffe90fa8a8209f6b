//! Search and lookup routes: filtered search, by email, by role, and branch
//! views. Teacher role or above, except that any caller may look up their
//! own email.

use std::collections::HashMap;

use account_client::types::{FindByBranchRequest, FindByRoleRequest, PageRequest, SearchUsersRequest};
use account_core::{AccountError, AccountPage, AccountProjection, AccountStatus, ErrorCollection, Role};
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, RawQuery, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use axum::Router;

use crate::dto::BranchSummary;
use crate::extractors::{parse_int_id, parse_page_request, path_id, path_param, query_map, RequestContext};
use crate::pipeline::Operation;
use crate::policy::{denied, has_role, require_role};
use crate::routes::{parse_role, DEFAULT_SORT_FIELD, SORT_FIELDS};
use crate::state::AppState;
use crate::validation::is_valid_email;

const MAX_QUERY_LEN: usize = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/search", get(search_users))
        .route("/search/email/{email}", get(find_by_email))
        .route("/search/role/{role}", get(find_by_role))
        .route("/branch/{branch_id}", get(branch_summary))
        .route("/branch/{branch_id}/users", get(branch_users))
}

/// Optional search filters from the query string.
#[derive(Debug, Default, PartialEq)]
struct SearchFilters {
    query: Option<String>,
    role: Option<Role>,
    branch_id: Option<i64>,
    statuses: Vec<AccountStatus>,
}

fn parse_filters(domain: &'static str, params: &HashMap<String, String>) -> Result<SearchFilters, AccountError> {
    let mut errors = ErrorCollection::new(domain);
    let mut filters = SearchFilters::default();

    if let Some(q) = params.get("q").map(|q| q.trim()).filter(|q| !q.is_empty()) {
        if q.chars().count() > MAX_QUERY_LEN {
            errors.add("q", "invalid_query", format!("q must be at most {MAX_QUERY_LEN} characters"));
        } else {
            filters.query = Some(q.to_string());
        }
    }
    if let Some(raw) = params.get("role").filter(|r| !r.is_empty()) {
        match parse_role(domain, "role", raw) {
            Ok(role) => filters.role = Some(role),
            Err(err) => errors.add("role", "invalid_role", err.message()),
        }
    }
    if let Some(raw) = params.get("branch_id").filter(|b| !b.is_empty()) {
        match parse_int_id("branch_id", raw) {
            Ok(id) => filters.branch_id = Some(id),
            Err(err) => errors.add("branch_id", "invalid_branch_id", err.message()),
        }
    }
    if let Some(raw) = params.get("status").filter(|s| !s.is_empty()) {
        for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match name.to_ascii_lowercase().parse::<AccountStatus>() {
                Ok(status) if !filters.statuses.contains(&status) => filters.statuses.push(status),
                Ok(_) => {}
                Err(_) => {
                    errors.add(
                        "status",
                        "invalid_status",
                        format!("status must be one of: {}", AccountStatus::NAMES.join(", ")),
                    );
                    break;
                }
            }
        }
    }
    errors.into_result().map(|()| filters)
}

fn page_request(query: Option<&str>) -> Result<(HashMap<String, String>, PageRequest), AccountError> {
    let params = query_map(query);
    let page = parse_page_request(&params, SORT_FIELDS, DEFAULT_SORT_FIELD)?;
    Ok((params, page))
}

/// Search accounts by text, role, branch and status.
#[utoipa::path(
    get,
    path = "/accounts/search",
    params(
        ("q" = Option<String>, Query, description = "Matches name or email"),
        ("role" = Option<String>, Query, description = "admin, teacher or student"),
        ("branch_id" = Option<i64>, Query, description = "Branch filter"),
        ("status" = Option<String>, Query, description = "Comma-separated statuses"),
        ("page" = Option<u32>, Query, description = "Page number, from 1"),
        ("page_size" = Option<u32>, Query, description = "1 to 100, default 10"),
        ("sort_by" = Option<String>, Query, description = "id, name, email, role, created_at or updated_at"),
        ("sort_order" = Option<String>, Query, description = "asc or desc"),
    ),
    responses(
        (status = 200, description = "Matching accounts", body = AccountPage),
        (status = 400, description = "Invalid filter, pagination or sort"),
        (status = 403, description = "Teacher role required"),
    ),
    security(("bearer_auth" = [])),
    tag = "search"
)]
pub async fn search_users(State(state): State<AppState>, ctx: RequestContext, RawQuery(query): RawQuery) -> Response {
    let op = Operation::start("search_users", &ctx);
    let result = search(&state, &ctx, query.as_deref()).await;
    op.respond(StatusCode::OK, result)
}

async fn search(state: &AppState, ctx: &RequestContext, query: Option<&str>) -> Result<AccountPage, AccountError> {
    let caller = ctx.caller()?;
    require_role(caller, Role::Teacher, "search", "users")?;
    let (params, page) = page_request(query)?;
    let filters = parse_filters(ctx.domain, &params)?;
    let request = SearchUsersRequest {
        query: filters.query,
        role: filters.role,
        branch_id: filters.branch_id,
        statuses: filters.statuses,
        page,
    };
    state.backend()?.search_users(&ctx.call_context(), request).await
}

/// Look up one account by email.
#[utoipa::path(
    get,
    path = "/accounts/search/email/{email}",
    params(("email" = String, Path, description = "Email address")),
    responses(
        (status = 200, description = "Account", body = AccountProjection),
        (status = 400, description = "Malformed email"),
        (status = 403, description = "Teacher role required for other accounts"),
        (status = 404, description = "No such account"),
    ),
    security(("bearer_auth" = [])),
    tag = "search"
)]
pub async fn find_by_email(
    State(state): State<AppState>,
    ctx: RequestContext,
    email: Result<Path<String>, PathRejection>,
) -> Response {
    let op = Operation::start("find_user_by_email", &ctx);
    let result = lookup_email(&state, &ctx, email).await;
    op.respond(StatusCode::OK, result)
}

async fn lookup_email(
    state: &AppState,
    ctx: &RequestContext,
    email: Result<Path<String>, PathRejection>,
) -> Result<AccountProjection, AccountError> {
    let caller = ctx.caller()?;
    let email = path_param("email", email)?.trim().to_string();
    if !is_valid_email(&email) {
        return Err(AccountError::validation(ctx.domain, "email", "Please provide a valid email address")
            .with_code("invalid_email"));
    }
    let own = caller.email.as_deref().map_or(false, |e| e.eq_ignore_ascii_case(&email));
    if !own && !has_role(caller, Role::Teacher) {
        return Err(denied(caller, Role::Teacher, "look up", "user"));
    }
    state.backend()?.find_by_email(&ctx.call_context(), &email).await
}

/// Page through accounts holding one role.
#[utoipa::path(
    get,
    path = "/accounts/search/role/{role}",
    params(
        ("role" = String, Path, description = "admin, teacher or student"),
        ("page" = Option<u32>, Query, description = "Page number, from 1"),
        ("page_size" = Option<u32>, Query, description = "1 to 100, default 10"),
    ),
    responses(
        (status = 200, description = "Accounts", body = AccountPage),
        (status = 400, description = "Unknown role or invalid pagination"),
        (status = 403, description = "Teacher role required"),
    ),
    security(("bearer_auth" = [])),
    tag = "search"
)]
pub async fn find_by_role(
    State(state): State<AppState>,
    ctx: RequestContext,
    role: Result<Path<String>, PathRejection>,
    RawQuery(query): RawQuery,
) -> Response {
    let op = Operation::start("find_users_by_role", &ctx);
    let result = lookup_role(&state, &ctx, role, query.as_deref()).await;
    op.respond(StatusCode::OK, result)
}

async fn lookup_role(
    state: &AppState,
    ctx: &RequestContext,
    role: Result<Path<String>, PathRejection>,
    query: Option<&str>,
) -> Result<AccountPage, AccountError> {
    let caller = ctx.caller()?;
    require_role(caller, Role::Teacher, "list", "users")?;
    let role = parse_role(ctx.domain, "role", &path_param("role", role)?)?;
    let (_, page) = page_request(query)?;
    state
        .backend()?
        .find_by_role(&ctx.call_context(), FindByRoleRequest { role, page })
        .await
}

/// Member count of a branch.
#[utoipa::path(
    get,
    path = "/accounts/branch/{branch_id}",
    params(("branch_id" = i64, Path, description = "Branch id")),
    responses(
        (status = 200, description = "Branch summary", body = BranchSummary),
        (status = 400, description = "Malformed branch id"),
        (status = 403, description = "Teacher role required"),
    ),
    security(("bearer_auth" = [])),
    tag = "search"
)]
pub async fn branch_summary(
    State(state): State<AppState>,
    ctx: RequestContext,
    branch_id: Result<Path<String>, PathRejection>,
) -> Response {
    let op = Operation::start("find_branch", &ctx);
    let result = summarize_branch(&state, &ctx, branch_id).await;
    op.respond(StatusCode::OK, result)
}

async fn summarize_branch(
    state: &AppState,
    ctx: &RequestContext,
    branch_id: Result<Path<String>, PathRejection>,
) -> Result<BranchSummary, AccountError> {
    let caller = ctx.caller()?;
    require_role(caller, Role::Teacher, "view", "branch")?;
    let branch_id = path_id("branch_id", branch_id)?;
    // One row is enough: only the total is reported.
    let page = PageRequest {
        page: 1,
        page_size: 1,
        ..PageRequest::default()
    };
    let result = state
        .backend()?
        .find_by_branch(&ctx.call_context(), FindByBranchRequest { branch_id, page })
        .await?;
    Ok(BranchSummary {
        branch_id,
        total_users: result.pagination.total,
    })
}

/// Page through the members of a branch.
#[utoipa::path(
    get,
    path = "/accounts/branch/{branch_id}/users",
    params(
        ("branch_id" = i64, Path, description = "Branch id"),
        ("page" = Option<u32>, Query, description = "Page number, from 1"),
        ("page_size" = Option<u32>, Query, description = "1 to 100, default 10"),
        ("sort_by" = Option<String>, Query, description = "id, name, email, role, created_at or updated_at"),
        ("sort_order" = Option<String>, Query, description = "asc or desc"),
    ),
    responses(
        (status = 200, description = "Branch members", body = AccountPage),
        (status = 400, description = "Malformed branch id or invalid pagination"),
        (status = 403, description = "Teacher role required"),
    ),
    security(("bearer_auth" = [])),
    tag = "search"
)]
pub async fn branch_users(
    State(state): State<AppState>,
    ctx: RequestContext,
    branch_id: Result<Path<String>, PathRejection>,
    RawQuery(query): RawQuery,
) -> Response {
    let op = Operation::start("find_users_by_branch", &ctx);
    let result = list_branch(&state, &ctx, branch_id, query.as_deref()).await;
    op.respond(StatusCode::OK, result)
}

async fn list_branch(
    state: &AppState,
    ctx: &RequestContext,
    branch_id: Result<Path<String>, PathRejection>,
    query: Option<&str>,
) -> Result<AccountPage, AccountError> {
    let caller = ctx.caller()?;
    require_role(caller, Role::Teacher, "list", "branch members")?;
    let branch_id = path_id("branch_id", branch_id)?;
    let (_, page) = page_request(query)?;
    state
        .backend()?
        .find_by_branch(&ctx.call_context(), FindByBranchRequest { branch_id, page })
        .await
}
