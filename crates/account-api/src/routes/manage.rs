//! Account status administration. Admin only; nobody changes their own
//! status.

use account_core::{AccountError, AccountStatus, Role};
use axum::body::Body;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::put;
use axum::Router;

use crate::dto::{StatusUpdateResponse, UpdateStatusBody};
use crate::extractors::{decode_body, path_id, DecodeOptions, RequestContext};
use crate::logging::{self, Severity};
use crate::pipeline::Operation;
use crate::policy::require_role;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/manage/{id}/status", put(update_account_status))
}

/// Set an account's status.
#[utoipa::path(
    put,
    path = "/accounts/manage/{id}/status",
    params(("id" = i64, Path, description = "Account id")),
    request_body = UpdateStatusBody,
    responses(
        (status = 200, description = "Status updated", body = StatusUpdateResponse),
        (status = 400, description = "Unknown status or malformed id"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "No such account"),
        (status = 422, description = "Callers cannot change their own status"),
    ),
    security(("bearer_auth" = [])),
    tag = "manage"
)]
pub async fn update_account_status(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: Result<Path<String>, PathRejection>,
    body: Body,
) -> Response {
    let mut op = Operation::start("update_account_status", &ctx);
    if let Ok(Path(raw)) = &id {
        op.set_field("target_id", raw.as_str());
    }
    let result = set_status(&state, &ctx, id, body).await;
    op.respond(StatusCode::OK, result)
}

async fn set_status(
    state: &AppState,
    ctx: &RequestContext,
    id: Result<Path<String>, PathRejection>,
    body: Body,
) -> Result<StatusUpdateResponse, AccountError> {
    let caller = ctx.caller()?;
    let target_id = path_id("id", id)?;
    if caller.user_id == target_id {
        return Err(AccountError::business_rule(
            ctx.domain,
            "self_status_change",
            "You cannot change the status of your own account",
        ));
    }
    require_role(caller, Role::Admin, "change the status of", "user")?;

    let body: UpdateStatusBody = decode_body(body, DecodeOptions::new(state.body_limit())).await?;
    let call = ctx.call_context();
    state.validator.validate(&call, ctx.domain, &body).await?;
    let status: AccountStatus = body.status.trim().parse().map_err(|_| {
        AccountError::validation(
            ctx.domain,
            "status",
            format!("status must be one of: {}", AccountStatus::NAMES.join(", ")),
        )
        .with_code("invalid_status")
    })?;

    let user = state.backend()?.update_account_status(&call, target_id, status).await?;
    logging::security_event(
        "account_status_changed",
        Severity::Medium,
        &format!("user {} set account {target_id} to {status}", caller.user_id),
    );
    logging::user_activity(caller.user_id, "update_account_status", Some(target_id));
    Ok(StatusUpdateResponse { user, status })
}
