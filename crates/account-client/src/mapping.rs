//! Translation of transport statuses into the account error taxonomy.
//!
//! | Transport code | Error kind |
//! |---|---|
//! | `InvalidArgument` | Validation |
//! | `Unauthenticated` | Authentication |
//! | `PermissionDenied` | Authorization |
//! | `NotFound` | NotFound |
//! | `AlreadyExists` | Conflict |
//! | `ResourceExhausted` | RateLimit |
//! | `FailedPrecondition` | BusinessRule |
//! | `Unavailable`, `DeadlineExceeded` | ExternalService (retryable) |
//! | anything else | System |
//!
//! Backend messages are kept in the cause chain only; the client-visible
//! message is a fixed text per kind.

use account_core::{AccountError, ErrorKind, Layer, DOMAIN_ACCOUNT};

use crate::operation::RpcOperation;
use crate::rpc::{RpcCode, RpcStatus};

/// Service name used in error details and logs.
pub const SERVICE_NAME: &str = "account_rpc";

/// Kind selected for a transport code.
pub fn kind_for(code: RpcCode) -> ErrorKind {
    match code {
        RpcCode::InvalidArgument => ErrorKind::Validation,
        RpcCode::Unauthenticated => ErrorKind::Authentication,
        RpcCode::PermissionDenied => ErrorKind::Authorization,
        RpcCode::NotFound => ErrorKind::NotFound,
        RpcCode::AlreadyExists => ErrorKind::Conflict,
        RpcCode::ResourceExhausted => ErrorKind::RateLimit,
        RpcCode::FailedPrecondition => ErrorKind::BusinessRule,
        RpcCode::Unavailable | RpcCode::DeadlineExceeded => ErrorKind::ExternalService,
        _ => ErrorKind::System,
    }
}

/// Map a transport failure of `op` into an [`AccountError`].
pub fn status_to_error(op: RpcOperation, status: RpcStatus) -> AccountError {
    let err = match kind_for(status.code) {
        ErrorKind::Validation => {
            AccountError::new(ErrorKind::Validation, "invalid_argument", "the request was rejected as invalid")
        }
        ErrorKind::Authentication => {
            AccountError::new(ErrorKind::Authentication, "unauthenticated", "authentication failed")
        }
        ErrorKind::Authorization => AccountError::new(
            ErrorKind::Authorization,
            "permission_denied",
            "you do not have permission to perform this action",
        ),
        ErrorKind::NotFound => {
            AccountError::new(ErrorKind::NotFound, "not_found", "the requested account was not found")
        }
        ErrorKind::Conflict => {
            AccountError::new(ErrorKind::Conflict, "already_exists", "the account already exists")
        }
        ErrorKind::RateLimit => AccountError::rate_limit(
            DOMAIN_ACCOUNT,
            "too many requests to the account service, try again later",
        ),
        ErrorKind::BusinessRule => AccountError::business_rule(
            DOMAIN_ACCOUNT,
            "failed_precondition",
            "the account is not in a state that allows this operation",
        ),
        ErrorKind::ExternalService => {
            let err = AccountError::external_service(DOMAIN_ACCOUNT, SERVICE_NAME, op.name(), true);
            if status.code == RpcCode::DeadlineExceeded {
                err.with_code("deadline_exceeded")
            } else {
                err
            }
        }
        _ => AccountError::system(DOMAIN_ACCOUNT, SERVICE_NAME),
    };
    err.with_layer(Layer::External)
        .with_operation(op.name())
        .with_detail("transport_code", status.code.as_str())
        .with_cause(status)
}

/// Write calls without an idempotency guarantee must not look retryable.
pub(crate) fn demote_retryable(op: RpcOperation, err: AccountError) -> AccountError {
    if err.is_retryable() {
        AccountError::external_service(DOMAIN_ACCOUNT, SERVICE_NAME, op.name(), false)
            .with_layer(Layer::External)
            .with_operation(op.name())
            .with_details(err.details().clone())
            .with_cause(err)
    } else {
        err
    }
}
