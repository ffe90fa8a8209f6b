//! # Integration Tests for the HTTP Account Transport
//!
//! Runs [`HttpAccountRpc`] and [`AccountBackend`] against wiremock servers
//! to check request construction, status-body parsing, HTTP fallbacks, and
//! the adapter's retry gating over a real socket.

use std::sync::Arc;

use account_client::types::{FindByIdRequest, RegisterRequest};
use account_client::{AccountBackend, AccountRpc, CallContext, HttpAccountRpc, HttpRpcConfig, RpcCode};
use account_core::{ErrorKind, Secret};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport(server: &MockServer) -> HttpAccountRpc {
    HttpAccountRpc::new(HttpRpcConfig::new(server.uri())).expect("transport build")
}

fn account_json(id: i64) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "branch_id": 3,
        "name": "Ada",
        "email": "ada@example.com",
        "role": "teacher",
        "status": "active",
        "email_verified": true,
        "password_hash": "salt$digest",
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-02T00:00:00Z"
    })
}

fn register_request(key: Option<&str>) -> RegisterRequest {
    RegisterRequest {
        name: "Ada".into(),
        email: "a@b.co".into(),
        password: Secret::from("Abcdef1!"),
        idempotency_key: key.map(str::to_string),
    }
}

// ── Transport ────────────────────────────────────────────────────────────

#[tokio::test]
async fn find_by_id_posts_to_method_path_with_request_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rpc/FindById"))
        .and(header("x-request-id", "req-123"))
        .and(body_partial_json(serde_json::json!({ "id": 42 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(account_json(42)))
        .expect(1)
        .mount(&server)
        .await;

    let record = transport(&server)
        .find_by_id(&CallContext::new("req-123"), FindByIdRequest { id: 42 })
        .await
        .expect("find_by_id");
    assert_eq!(record.id, 42);
    assert_eq!(record.branch_id, 3);
}

#[tokio::test]
async fn status_body_is_parsed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rpc/FindById"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "code": "NOT_FOUND",
            "message": "account 9 does not exist"
        })))
        .mount(&server)
        .await;

    let status = transport(&server)
        .find_by_id(&CallContext::new("r"), FindByIdRequest { id: 9 })
        .await
        .unwrap_err();
    assert_eq!(status.code, RpcCode::NotFound);
    assert_eq!(status.message, "account 9 does not exist");
}

#[tokio::test]
async fn unparseable_error_body_falls_back_to_http_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rpc/FindById"))
        .respond_with(ResponseTemplate::new(504).set_body_string("gateway timeout"))
        .mount(&server)
        .await;

    let status = transport(&server)
        .find_by_id(&CallContext::new("r"), FindByIdRequest { id: 1 })
        .await
        .unwrap_err();
    assert_eq!(status.code, RpcCode::DeadlineExceeded);
}

#[tokio::test]
async fn unreachable_backend_is_unavailable() {
    // Nothing listens on port 9 of localhost in the test environment.
    let rpc = HttpAccountRpc::new(HttpRpcConfig::new("http://127.0.0.1:9")).expect("transport build");
    let status = rpc
        .find_by_id(&CallContext::new("r"), FindByIdRequest { id: 1 })
        .await
        .unwrap_err();
    assert_eq!(status.code, RpcCode::Unavailable);
}

#[tokio::test]
async fn register_sends_password_to_backend_only_in_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rpc/Register"))
        .and(body_partial_json(serde_json::json!({
            "email": "a@b.co",
            "password": "Abcdef1!"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": 42, "name": "Ada", "email": "a@b.co", "success": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = transport(&server)
        .register(&CallContext::new("r"), register_request(None))
        .await
        .expect("register");
    assert_eq!(reply.id, 42);
}

// ── Adapter over HTTP ────────────────────────────────────────────────────

#[tokio::test]
async fn adapter_retries_idempotent_reads_on_503() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rpc/FindById"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let backend = AccountBackend::new(Arc::new(transport(&server)));
    let err = backend.find_by_id(&CallContext::new("r"), 1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalService);
    assert!(err.is_retryable());
    assert_eq!(err.http_status(), 503);
}

#[tokio::test]
async fn adapter_does_not_retry_register_without_key() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rpc/Register"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let backend = AccountBackend::new(Arc::new(transport(&server)));
    let err = backend
        .register(&CallContext::new("r"), register_request(None))
        .await
        .unwrap_err();
    assert!(!err.is_retryable());
    assert_eq!(err.http_status(), 502);
}

#[tokio::test]
async fn adapter_retries_register_with_idempotency_key() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rpc/Register"))
        .and(body_partial_json(serde_json::json!({ "idempotency_key": "k-1" })))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let backend = AccountBackend::new(Arc::new(transport(&server)));
    let err = backend
        .register(&CallContext::new("r"), register_request(Some("k-1")))
        .await
        .unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn adapter_strips_password_hash() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rpc/FindById"))
        .respond_with(ResponseTemplate::new(200).set_body_json(account_json(5)))
        .mount(&server)
        .await;

    let backend = AccountBackend::new(Arc::new(transport(&server)));
    let account = backend.find_by_id(&CallContext::new("r"), 5).await.expect("find");
    let json = serde_json::to_string(&account).unwrap();
    assert!(!json.contains("salt$digest"));
    assert!(!json.contains("password"));
}
