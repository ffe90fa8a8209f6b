//! The stub served over a real socket, driven by the production HTTP
//! transport and adapter.

use std::sync::Arc;

use account_client::types::{LoginRequest, RegisterRequest};
use account_client::{AccountBackend, CallContext, HttpAccountRpc, HttpRpcConfig, RpcCode};
use account_core::{ErrorKind, Role, Secret};
use account_stub::{InMemoryAccounts, SeedAccount};

async fn serve(store: InMemoryAccounts) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, account_stub::router(store).into_make_service())
            .await
            .expect("serve");
    });
    format!("http://{addr}")
}

fn backend(url: &str) -> AccountBackend {
    AccountBackend::new(Arc::new(HttpAccountRpc::new(HttpRpcConfig::new(url)).expect("transport")))
}

#[tokio::test]
async fn register_then_login_over_http() {
    let url = serve(InMemoryAccounts::new()).await;
    let backend = backend(&url);
    let ctx = CallContext::new("round-trip");

    let reply = backend
        .register(
            &ctx,
            RegisterRequest {
                name: "Ada".into(),
                email: "a@b.co".into(),
                password: Secret::from("Abcdef1!"),
                idempotency_key: None,
            },
        )
        .await
        .expect("register");
    assert!(reply.success);

    let session = backend
        .login(
            &ctx,
            LoginRequest {
                email: "a@b.co".into(),
                password: Secret::from("Abcdef1!"),
            },
        )
        .await
        .expect("login");
    assert_eq!(session.account.id, reply.id);
    assert!(!session.tokens.access_token.is_empty());
}

#[tokio::test]
async fn wrong_password_maps_to_authentication() {
    let store = InMemoryAccounts::new();
    store.seed(SeedAccount::new("Ada", "ada@example.com", "Abcdef1!", Role::Student));
    let url = serve(store).await;

    let err = backend(&url)
        .login(
            &CallContext::new("r"),
            LoginRequest {
                email: "ada@example.com".into(),
                password: Secret::from("nope"),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert_eq!(err.http_status(), 401);
}

#[tokio::test]
async fn injected_unavailable_is_retried_for_reads() {
    let store = InMemoryAccounts::new();
    let seeded = store.seed(SeedAccount::new("Ada", "ada@example.com", "Abcdef1!", Role::Student));
    store.inject_faults(&[RpcCode::Unavailable, RpcCode::Unavailable]);
    let url = serve(store.clone()).await;

    let account = backend(&url)
        .find_by_id(&CallContext::new("r"), seeded.id)
        .await
        .expect("third attempt succeeds");
    assert_eq!(account.id, seeded.id);
    assert_eq!(store.calls().len(), 3);
}
