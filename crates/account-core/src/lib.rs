//! # account-core: Foundational Types
//!
//! Framework-free building blocks shared by the backend client and the HTTP
//! edge layer of the account service.
//!
//! ## Modules
//!
//! - [`error`]: the domain-aware error taxonomy and error collections.
//! - [`masking`]: masking of passwords, tokens, secrets, and emails.
//! - [`domain`]: roles, statuses, account projections, pagination metadata.
//! - [`envelope`]: success and error response envelopes.
//!
//! ## Crate Policy
//!
//! - Sits at the bottom of the dependency DAG.
//! - No HTTP framework types; status codes are plain `u16`.

pub mod domain;
pub mod envelope;
pub mod error;
pub mod masking;

pub use domain::{AccountPage, AccountProjection, AccountStatus, PageInfo, Role, SortOrder};
pub use masking::Secret;
pub use envelope::{ErrorEnvelope, SuccessEnvelope};
pub use error::{AccountError, Details, ErrorCollection, ErrorKind, FieldViolation, Layer, DOMAIN_ACCOUNT};
