//! In-memory account backend.
//!
//! [`InMemoryAccounts`] implements `account_client::AccountRpc` directly, so
//! tests can plug it into the edge layer without a network hop, and
//! [`routes::router`] serves the same store over the HTTP/JSON wire format
//! for local development.
//!
//! Storage is in-memory (DashMap) with no persistence. Data is lost on
//! restart.

pub mod routes;
pub mod store;

pub use routes::router;
pub use store::{InMemoryAccounts, RecordedCall, SeedAccount};
