//! Account backend stub server.
//!
//! Serves [`account_stub::InMemoryAccounts`] over HTTP so the edge service
//! can run locally against `ACCOUNT_BACKEND_URL=http://127.0.0.1:8090`.
//! Set `ACCOUNT_STUB_SEED_ADMIN=email:password` to create an admin account
//! at startup.

use std::net::SocketAddr;

use account_core::Role;
use account_stub::{InMemoryAccounts, SeedAccount};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port: u16 = std::env::var("ACCOUNT_STUB_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8090);

    let store = InMemoryAccounts::new();
    if let Some((email, password)) = std::env::var("ACCOUNT_STUB_SEED_ADMIN")
        .ok()
        .as_deref()
        .and_then(|v| v.split_once(':'))
        .map(|(e, p)| (e.to_string(), p.to_string()))
    {
        let admin = store.seed(SeedAccount::new("Administrator", &email, &password, Role::Admin));
        tracing::info!(id = admin.id, "seeded admin account");
    }

    let app = account_stub::router(store);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("account-stub listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await
}
