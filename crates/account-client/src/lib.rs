//! # account-client: Account Backend Client
//!
//! Everything the edge layer needs to talk to the account backend:
//!
//! - [`rpc`]: the typed RPC contract ([`AccountRpc`]) and transport statuses.
//! - [`types`]: request and reply messages.
//! - [`http`]: JSON-over-HTTP transport implementing [`AccountRpc`].
//! - [`adapter`]: [`AccountBackend`], which applies timeouts, retries,
//!   error mapping, and projection sanitization.
//! - [`mapping`]: transport status to error taxonomy translation.
//! - [`operation`]: per-method timeout class and idempotency.
//! - [`retry`]: linear-backoff retry loop.
//!
//! Handlers depend on [`AccountBackend`] only. They never see an
//! [`RpcStatus`] or an [`types::AccountRecord`].

pub mod adapter;
pub mod http;
pub mod mapping;
pub mod operation;
pub mod retry;
pub mod rpc;
pub mod types;

pub use adapter::{AccountBackend, AdapterConfig, Session};
pub use http::{HttpAccountRpc, HttpRpcConfig, TransportError};
pub use operation::RpcOperation;
pub use retry::RetryPolicy;
pub use rpc::{AccountRpc, CallContext, RpcCode, RpcStatus};
