//! Authorization checks over the role hierarchy `student < teacher < admin`.
//!
//! Callers may always act on their own account; any other target needs the
//! stated role. Changing a role needs admin. Every denial is a 403 carrying
//! `details.required_role` and logs an `access_denied` security event.

use account_core::{AccountError, Role};

use crate::auth::CallerIdentity;
use crate::logging::{self, Severity};

/// Denial for `action` on `resource` for want of `required`. Logs the
/// `access_denied` event.
pub fn denied(caller: &CallerIdentity, required: Role, action: &str, resource: &str) -> AccountError {
    logging::security_event(
        "access_denied",
        Severity::Medium,
        &format!(
            "user {} ({}) attempted to {action} {resource}, requires {required}",
            caller.user_id,
            caller.effective_role()
        ),
    );
    AccountError::authorization(account_core::DOMAIN_ACCOUNT, action, resource)
        .with_detail("required_role", required.as_str())
}

/// `actual.level >= required.level`.
pub fn has_role(caller: &CallerIdentity, required: Role) -> bool {
    caller.effective_role().satisfies(required)
}

pub fn require_role(caller: &CallerIdentity, required: Role, action: &str, resource: &str) -> Result<(), AccountError> {
    if has_role(caller, required) {
        Ok(())
    } else {
        Err(denied(caller, required, action, resource))
    }
}

/// The caller owns `target_id`, or holds `required`.
pub fn require_self_or_role(
    caller: &CallerIdentity,
    target_id: i64,
    required: Role,
    action: &str,
    resource: &str,
) -> Result<(), AccountError> {
    if caller.user_id == target_id {
        return Ok(());
    }
    require_role(caller, required, action, resource)
}

/// Resource ownership: the caller is the owner, or an admin.
pub fn is_owner_or_admin(caller: &CallerIdentity, owner_id: i64) -> bool {
    caller.user_id == owner_id || caller.is_admin()
}

/// Setting any role requires admin. A non-admin may resend their current
/// role unchanged.
pub fn forbid_role_escalation(
    caller: &CallerIdentity,
    requested: Option<Role>,
    current: Option<Role>,
) -> Result<(), AccountError> {
    match requested {
        Some(role) if Some(role) != current && !caller.is_admin() => {
            Err(denied(caller, Role::Admin, "change the role of", "user"))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(id: i64) -> CallerIdentity {
        CallerIdentity::new(id).with_role(Role::Student)
    }

    #[test]
    fn hierarchy_is_ordered() {
        let teacher = CallerIdentity::new(1).with_role(Role::Teacher);
        assert!(has_role(&teacher, Role::Student));
        assert!(has_role(&teacher, Role::Teacher));
        assert!(!has_role(&teacher, Role::Admin));
        assert!(!has_role(&CallerIdentity::new(2), Role::Teacher));
    }

    #[test]
    fn self_access_bypasses_role() {
        assert!(require_self_or_role(&student(5), 5, Role::Admin, "update", "user").is_ok());
        let err = require_self_or_role(&student(5), 6, Role::Admin, "update", "user").unwrap_err();
        assert!(err.is_authorization());
        assert_eq!(err.http_status(), 403);
        assert_eq!(err.details()["required_role"], "admin");
    }

    #[test]
    fn ownership() {
        assert!(is_owner_or_admin(&student(3), 3));
        assert!(!is_owner_or_admin(&student(3), 4));
        assert!(is_owner_or_admin(&CallerIdentity::new(9).with_role(Role::Admin), 4));
    }

    #[test]
    fn role_changes_need_admin() {
        assert!(forbid_role_escalation(&student(1), Some(Role::Admin), Some(Role::Student)).is_err());
        assert!(forbid_role_escalation(&student(1), Some(Role::Student), Some(Role::Student)).is_ok());
        assert!(forbid_role_escalation(&student(1), None, Some(Role::Student)).is_ok());
        let admin = CallerIdentity::new(9).with_role(Role::Admin);
        assert!(forbid_role_escalation(&admin, Some(Role::Teacher), Some(Role::Student)).is_ok());
    }
}
