//! Role-rank authorization gate
//!
//! Pure and stateless. Used as a request-pipeline filter by the API and
//! directly by the client session guard for page-level checks.

use crate::error::AuthorizationError;
use crate::role::Role;

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Compares principal role rank against a required minimum.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionGate;

impl PermissionGate {
    /// Authorize a principal presenting a raw role string.
    ///
    /// Allows iff the string names a known role whose rank is at least the
    /// rank of `required`. Absent or unrecognized roles deny.
    pub fn authorize(principal_role: Option<&str>, required: Role) -> Result<(), AuthorizationError> {
        let raw = match principal_role {
            Some(raw) => raw,
            None => return Err(AuthorizationError::MissingRole { required }),
        };
        let role: Role = raw.parse().map_err(|_| AuthorizationError::UnknownRole {
            role: raw.to_string(),
            required,
        })?;
        Self::authorize_role(Some(role), required)
    }

    /// Authorize an already-parsed role.
    pub fn authorize_role(principal_role: Option<Role>, required: Role) -> Result<(), AuthorizationError> {
        match principal_role {
            None => Err(AuthorizationError::MissingRole { required }),
            Some(actual) if actual.includes(required) => Ok(()),
            Some(actual) => Err(AuthorizationError::InsufficientRole { actual, required }),
        }
    }

    /// Boolean form of [`PermissionGate::authorize`].
    pub fn decide(principal_role: Option<&str>, required: Role) -> Decision {
        match Self::authorize(principal_role, required) {
            Ok(()) => Decision::Allow,
            Err(_) => Decision::Deny,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_concrete_decisions() {
        assert_eq!(PermissionGate::decide(Some("employee"), Role::Admin), Decision::Deny);
        assert_eq!(PermissionGate::decide(Some("admin"), Role::Employee), Decision::Allow);
        assert_eq!(PermissionGate::decide(Some("manager"), Role::Manager), Decision::Allow);
    }

    #[test]
    fn test_missing_role_denies() {
        let err = PermissionGate::authorize(None, Role::User).unwrap_err();
        assert_eq!(err, AuthorizationError::MissingRole { required: Role::User });
    }

    #[test]
    fn test_unknown_role_denies_even_for_lowest_requirement() {
        let err = PermissionGate::authorize(Some("root"), Role::User).unwrap_err();
        assert!(matches!(err, AuthorizationError::UnknownRole { ref role, .. } if role == "root"));
        assert_eq!(PermissionGate::decide(Some(""), Role::User), Decision::Deny);
    }

    #[test]
    fn test_insufficient_role_reports_both_roles() {
        let err = PermissionGate::authorize(Some("manager"), Role::Admin).unwrap_err();
        assert_eq!(err.actual(), Some(Role::Manager));
        assert_eq!(err.required(), Role::Admin);
    }

    fn any_role() -> impl Strategy<Value = Role> {
        prop::sample::select(Role::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_authorization_is_monotonic_in_rank(
            r in any_role(),
            r2 in any_role(),
            required in any_role(),
        ) {
            let allowed = PermissionGate::authorize_role(Some(r), required).is_ok();
            if allowed && r2.rank() >= r.rank() {
                prop_assert!(PermissionGate::authorize_role(Some(r2), required).is_ok());
            }
        }

        #[test]
        fn prop_allow_iff_rank_at_least_required(r in any_role(), required in any_role()) {
            let allowed = PermissionGate::decide(Some(r.as_str()), required).is_allowed();
            prop_assert_eq!(allowed, r.rank() >= required.rank());
        }

        #[test]
        fn prop_unrecognized_strings_always_deny(raw in "[a-z]{0,12}", required in any_role()) {
            prop_assume!(raw.parse::<Role>().is_err());
            prop_assert_eq!(PermissionGate::decide(Some(&raw), required), Decision::Deny);
        }
    }
}
