//! Error types for marquee operations

use crate::role::Role;
use thiserror::Error;

/// Persistent store errors.
///
/// `Clone` because a single hydrate outcome is shared by every caller that
/// coalesced onto it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Query failed during {operation}: {reason}")]
    QueryFailed { operation: String, reason: String },

    #[error("Stored record is malformed: {reason}")]
    MalformedRecord { reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Validation errors raised at the gateway boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Field {field} must not be empty")]
    Empty { field: String },
}

impl ValidationError {
    /// Name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::RequiredFieldMissing { field }
            | ValidationError::InvalidValue { field, .. }
            | ValidationError::Empty { field } => field,
        }
    }
}

/// Authorization denials. Every variant is a deny; there is no partial grant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("No role presented; {required} required")]
    MissingRole { required: Role },

    #[error("Unrecognized role '{role}'; {required} required")]
    UnknownRole { role: String, required: Role },

    #[error("Role {actual} is below required role {required}")]
    InsufficientRole { actual: Role, required: Role },
}

impl AuthorizationError {
    /// The role the operation demanded.
    pub fn required(&self) -> Role {
        match self {
            AuthorizationError::MissingRole { required }
            | AuthorizationError::UnknownRole { required, .. }
            | AuthorizationError::InsufficientRole { required, .. } => *required,
        }
    }

    /// The recognized role of the principal, if any.
    pub fn actual(&self) -> Option<Role> {
        match self {
            AuthorizationError::InsufficientRole { actual, .. } => Some(*actual),
            _ => None,
        }
    }
}

/// Identity resolution failures on the client side.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session resolution failed: {reason}")]
    ResolutionFailed { reason: String },

    #[error("Identity provider returned an invalid session: {reason}")]
    InvalidResponse { reason: String },

    #[error("Session resolution timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all marquee errors.
#[derive(Debug, Clone, Error)]
pub enum MarqueeError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for marquee operations.
pub type MarqueeResult<T> = Result<T, MarqueeError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display_unavailable() {
        let err = StoreError::Unavailable {
            reason: "connection refused".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Store unavailable"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_validation_error_field() {
        let err = ValidationError::InvalidValue {
            field: "content.hero".to_string(),
            reason: "must be an object".to_string(),
        };
        assert_eq!(err.field(), "content.hero");
        assert_eq!(
            ValidationError::Empty {
                field: "content".to_string()
            }
            .field(),
            "content"
        );
    }

    #[test]
    fn test_authorization_error_accessors() {
        let err = AuthorizationError::InsufficientRole {
            actual: Role::Manager,
            required: Role::Admin,
        };
        assert_eq!(err.required(), Role::Admin);
        assert_eq!(err.actual(), Some(Role::Manager));
        assert!(format!("{}", err).contains("manager"));

        let err = AuthorizationError::UnknownRole {
            role: "superuser".to_string(),
            required: Role::Admin,
        };
        assert_eq!(err.actual(), None);
        assert!(format!("{}", err).contains("superuser"));
    }

    #[test]
    fn test_marquee_error_from_conversions() {
        let err: MarqueeError = StoreError::LockPoisoned.into();
        assert!(matches!(err, MarqueeError::Store(StoreError::LockPoisoned)));

        let err: MarqueeError = SessionError::Timeout { timeout_ms: 500 }.into();
        assert!(format!("{}", err).contains("500ms"));
    }
}
