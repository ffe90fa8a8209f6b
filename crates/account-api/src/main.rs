//! # account-api: Binary Entry Point
//!
//! Loads configuration, installs logging and the Prometheus recorder, wires
//! the HTTP backend adapter, and serves the edge router.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use account_api::config::AccountConfig;
use account_api::middleware::metrics::install_recorder;
use account_api::state::AppState;
use account_client::http::{HttpAccountRpc, HttpRpcConfig};
use account_client::AccountBackend;
use anyhow::Context;
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "account-api", version, about = "Account service HTTP edge")]
struct Cli {
    /// YAML configuration file. Environment variables override its values.
    #[arg(long, env = "ACCOUNT_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AccountConfig::load(cli.config.as_deref()).context("loading configuration")?;
    account_api::logging::init(config.log_format);

    let mut state = AppState::new(config.clone());
    match install_recorder() {
        Ok(handle) => state = state.with_metrics(handle),
        Err(e) => tracing::warn!("Prometheus recorder not installed: {e}. /metrics is disabled."),
    }

    match config.backend_url.as_deref() {
        Some(url) => {
            let rpc = HttpAccountRpc::new(HttpRpcConfig::new(url))
                .with_context(|| format!("building backend client for {url}"))?;
            tracing::info!(backend = %rpc.base_url(), "account backend configured");
            state = state.with_backend(AccountBackend::new(Arc::new(rpc)));
        }
        None => tracing::warn!(
            "ACCOUNT_BACKEND_URL not set. Account endpoints will return 503 until it is configured."
        ),
    }

    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind address {}", config.bind_addr))?;
    let app = account_api::app(state);

    tracing::info!("account-api listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
