//! Resolved identity as seen by a page

use crate::role::Role;
use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// Resolution status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Loading,
    Unauthenticated,
    Authenticated,
}

/// Identity of the current visitor.
///
/// `role` is optional even when authenticated: an identity provider may know
/// who someone is without having assigned them a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub subject: Option<String>,
    pub role: Option<Role>,
    pub status: SessionStatus,
    pub expires_at: Option<Timestamp>,
}

impl Session {
    pub fn loading() -> Self {
        Self {
            subject: None,
            role: None,
            status: SessionStatus::Loading,
            expires_at: None,
        }
    }

    pub fn unauthenticated() -> Self {
        Self {
            status: SessionStatus::Unauthenticated,
            ..Self::loading()
        }
    }

    pub fn authenticated(subject: impl Into<String>, role: Option<Role>) -> Self {
        Self {
            subject: Some(subject.into()),
            role,
            status: SessionStatus::Authenticated,
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: Timestamp) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// True if the session carries an expiry at or before `now`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

/// Wire form of a session, returned by `GET /api/v1/session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SessionInfo {
    pub subject: Option<String>,
    /// Raw role string as carried by the credential. Unknown values are
    /// passed through so the caller can see what was presented.
    pub role: Option<String>,
    pub status: SessionStatus,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub expires_at: Option<Timestamp>,
}

impl SessionInfo {
    /// Interpret the wire form. An unrecognized role string becomes an
    /// absent role, which no role requirement accepts.
    pub fn into_session(self) -> Session {
        Session {
            subject: self.subject,
            role: self.role.as_deref().and_then(|r| r.parse().ok()),
            status: self.status,
            expires_at: self.expires_at,
        }
    }
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        Self {
            subject: session.subject.clone(),
            role: session.role.map(|r| r.as_str().to_string()),
            status: session.status,
            expires_at: session.expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_constructors() {
        assert_eq!(Session::loading().status, SessionStatus::Loading);
        assert_eq!(Session::unauthenticated().status, SessionStatus::Unauthenticated);
        let s = Session::authenticated("u-1", Some(Role::Manager));
        assert_eq!(s.subject.as_deref(), Some("u-1"));
        assert_eq!(s.role, Some(Role::Manager));
    }

    #[test]
    fn test_expiry_boundary_is_expired() {
        let now = Utc::now();
        let s = Session::authenticated("u-1", None).with_expiry(now);
        assert!(s.is_expired_at(now));
        assert!(!s.is_expired_at(now - Duration::seconds(1)));
        assert!(!Session::authenticated("u-2", None).is_expired_at(now));
    }

    #[test]
    fn test_session_info_unknown_role_becomes_absent() {
        let info = SessionInfo {
            subject: Some("u-1".to_string()),
            role: Some("superuser".to_string()),
            status: SessionStatus::Authenticated,
            expires_at: None,
        };
        let session = info.into_session();
        assert_eq!(session.role, None);
        assert_eq!(session.status, SessionStatus::Authenticated);
    }

    #[test]
    fn test_session_info_json_shape() {
        let info = SessionInfo::from(&Session::authenticated("u-1", Some(Role::Admin)));
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["role"], "admin");
        assert_eq!(json["status"], "authenticated");
    }
}
