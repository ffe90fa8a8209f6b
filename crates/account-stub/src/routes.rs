//! HTTP routes of the stub backend.
//!
//! Serves the wire format `account_client::HttpAccountRpc` speaks:
//! `POST /rpc/{Method}` with a JSON request body, replying with the JSON
//! reply message or, on failure, `{ "code": "...", "message": "..." }`
//! under a matching HTTP status.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use account_client::operation::RpcOperation;
use account_client::rpc::{AccountRpc, CallContext, RpcCode, RpcStatus};

use crate::store::InMemoryAccounts;

/// Build the stub router.
pub fn router(state: InMemoryAccounts) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/rpc/{method}", post(dispatch))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// HTTP status carrying a transport code.
pub fn http_status_for(code: RpcCode) -> StatusCode {
    match code {
        RpcCode::InvalidArgument | RpcCode::OutOfRange => StatusCode::BAD_REQUEST,
        RpcCode::Unauthenticated => StatusCode::UNAUTHORIZED,
        RpcCode::PermissionDenied => StatusCode::FORBIDDEN,
        RpcCode::NotFound => StatusCode::NOT_FOUND,
        RpcCode::AlreadyExists | RpcCode::Aborted => StatusCode::CONFLICT,
        RpcCode::FailedPrecondition => StatusCode::PRECONDITION_FAILED,
        RpcCode::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        RpcCode::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        RpcCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        RpcCode::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        RpcCode::Cancelled
        | RpcCode::Unknown
        | RpcCode::Internal
        | RpcCode::DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn status_response(status: RpcStatus) -> Response {
    (http_status_for(status.code), Json(status)).into_response()
}

fn reply<T: Serialize>(result: Result<T, RpcStatus>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(status) => status_response(status),
    }
}

fn decode<T: DeserializeOwned>(op: RpcOperation, body: Value) -> Result<T, RpcStatus> {
    serde_json::from_value(body)
        .map_err(|e| RpcStatus::invalid_argument(format!("{}: malformed request: {e}", op.method())))
}

async fn dispatch(
    State(store): State<InMemoryAccounts>,
    Path(method): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let Some(op) = RpcOperation::from_method(&method) else {
        return status_response(RpcStatus::new(
            RpcCode::Unimplemented,
            format!("unknown method {method}"),
        ));
    };
    let request_id = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let ctx = CallContext::new(request_id);

    macro_rules! call {
        ($method:ident) => {
            match decode(op, body) {
                Ok(req) => reply(store.$method(&ctx, req).await),
                Err(status) => status_response(status),
            }
        };
    }

    match op {
        RpcOperation::Register => call!(register),
        RpcOperation::Login => call!(login),
        RpcOperation::Logout => call!(logout),
        RpcOperation::RefreshToken => call!(refresh_token),
        RpcOperation::ValidateToken => call!(validate_token),
        RpcOperation::CreateUser => call!(create_user),
        RpcOperation::FindById => call!(find_by_id),
        RpcOperation::FindByEmail => call!(find_by_email),
        RpcOperation::FindByRole => call!(find_by_role),
        RpcOperation::FindByBranch => call!(find_by_branch),
        RpcOperation::UpdateUser => call!(update_user),
        RpcOperation::DeleteUser => call!(delete_user),
        RpcOperation::FindAllUsers => call!(find_all_users),
        RpcOperation::SearchUsers => call!(search_users),
        RpcOperation::ChangePassword => call!(change_password),
        RpcOperation::ForgotPassword => call!(forgot_password),
        RpcOperation::ResetPassword => call!(reset_password),
        RpcOperation::VerifyEmail => call!(verify_email),
        RpcOperation::ResendVerification => call!(resend_verification),
        RpcOperation::UpdateAccountStatus => call!(update_account_status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SeedAccount;
    use account_core::Role;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn post(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-request-id", "stub-req")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn health_ok() {
        let app = router(InMemoryAccounts::new());
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn find_by_id_over_http() {
        let store = InMemoryAccounts::new();
        let seeded = store.seed(SeedAccount::new("Ada", "ada@example.com", "Abcdef1!", Role::Teacher));
        let (status, body) = post(router(store.clone()), "/rpc/FindById", json!({ "id": seeded.id })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "ada@example.com");
        assert_eq!(store.calls()[0].request_id, "stub-req");
    }

    #[tokio::test]
    async fn missing_account_is_404_with_status_body() {
        let (status, body) = post(router(InMemoryAccounts::new()), "/rpc/FindById", json!({ "id": 77 })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn unknown_method_is_unimplemented() {
        let (status, body) = post(router(InMemoryAccounts::new()), "/rpc/DropTables", json!({})).await;
        assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
        assert_eq!(body["code"], "UNIMPLEMENTED");
    }

    #[tokio::test]
    async fn malformed_request_is_invalid_argument() {
        let (status, body) = post(router(InMemoryAccounts::new()), "/rpc/FindById", json!({ "id": "x" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_ARGUMENT");
    }
}
