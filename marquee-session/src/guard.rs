//! Page-level session guard.
//!
//! A [`SessionGuard`] is fed every observation of the visitor's session and
//! answers with what the page should do. It never redirects while the
//! session is still resolving, and it redirects at most once per transition
//! into a state the page does not accept.

use marquee_core::{PermissionGate, Role, Session, SessionStatus, Timestamp};
use tracing::{debug, info, warn};

/// Which authenticated principals a page accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleRequirement {
    /// Any authenticated principal, with or without a role.
    AnyAuthenticated,
    /// Rank at least the given role.
    AtLeast(Role),
    /// Exactly one of the listed roles.
    OneOf(Vec<Role>),
}

impl RoleRequirement {
    pub fn allows(&self, role: Option<Role>) -> bool {
        match self {
            RoleRequirement::AnyAuthenticated => true,
            RoleRequirement::AtLeast(required) => {
                PermissionGate::authorize_role(role, *required).is_ok()
            }
            RoleRequirement::OneOf(roles) => role.is_some_and(|r| roles.contains(&r)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePolicy {
    pub requirement: RoleRequirement,
    pub login_path: String,
}

impl PagePolicy {
    pub fn new(requirement: RoleRequirement, login_path: impl Into<String>) -> Self {
        Self {
            requirement,
            login_path: login_path.into(),
        }
    }
}

/// Guard state. Leaves `Loading` once and never returns to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Loading,
    Unauthenticated,
    Authenticated(Option<Role>),
}

/// What the page should do after an observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardAction {
    /// Session still resolving: render nothing protected, no redirect.
    Wait,
    Render,
    Redirect { to: String },
    /// The redirect for this state was already issued: render nothing, do nothing.
    Blocked,
}

#[derive(Debug, Clone)]
pub struct SessionGuard {
    policy: PagePolicy,
    state: GuardState,
    redirect_issued: bool,
    redirects: u64,
}

impl SessionGuard {
    pub fn new(policy: PagePolicy) -> Self {
        Self {
            policy,
            state: GuardState::Loading,
            redirect_issued: false,
            redirects: 0,
        }
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    pub fn policy(&self) -> &PagePolicy {
        &self.policy
    }

    /// Redirects issued over the guard's lifetime.
    pub fn redirect_count(&self) -> u64 {
        self.redirects
    }

    /// Feed the current session. An authenticated session whose expiry is at
    /// or before `now` counts as unauthenticated.
    pub fn observe(&mut self, session: &Session, now: Timestamp) -> GuardAction {
        let next = match session.status {
            SessionStatus::Loading => GuardState::Loading,
            SessionStatus::Unauthenticated => GuardState::Unauthenticated,
            SessionStatus::Authenticated if session.is_expired_at(now) => {
                if matches!(self.state, GuardState::Authenticated(_)) {
                    info!(subject = ?session.subject, "Session expired");
                }
                GuardState::Unauthenticated
            }
            SessionStatus::Authenticated => GuardState::Authenticated(session.role),
        };
        self.transition(next);
        self.evaluate()
    }

    /// Explicit sign-out. Always lands in `Unauthenticated`.
    pub fn sign_out(&mut self) -> GuardAction {
        self.transition(GuardState::Unauthenticated);
        self.evaluate()
    }

    fn transition(&mut self, next: GuardState) {
        if next == self.state {
            return;
        }
        if next == GuardState::Loading {
            warn!(from = ?self.state, "Ignoring transition back to Loading");
            return;
        }
        debug!(from = ?self.state, to = ?next, "Session guard transition");
        self.state = next;
        self.redirect_issued = false;
    }

    fn evaluate(&mut self) -> GuardAction {
        match self.state {
            GuardState::Loading => GuardAction::Wait,
            GuardState::Authenticated(role) if self.policy.requirement.allows(role) => {
                GuardAction::Render
            }
            GuardState::Authenticated(_) | GuardState::Unauthenticated => self.redirect_once(),
        }
    }

    fn redirect_once(&mut self) -> GuardAction {
        if self.redirect_issued {
            return GuardAction::Blocked;
        }
        self.redirect_issued = true;
        self.redirects += 1;
        info!(to = %self.policy.login_path, state = ?self.state, "Redirecting to login");
        GuardAction::Redirect {
            to: self.policy.login_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn guard(requirement: RoleRequirement) -> SessionGuard {
        SessionGuard::new(PagePolicy::new(requirement, "/login"))
    }

    fn redirect() -> GuardAction {
        GuardAction::Redirect {
            to: "/login".to_string(),
        }
    }

    #[test]
    fn test_loading_waits_without_redirect() {
        let mut g = guard(RoleRequirement::AnyAuthenticated);
        for _ in 0..5 {
            assert_eq!(g.observe(&Session::loading(), Utc::now()), GuardAction::Wait);
        }
        assert_eq!(g.redirect_count(), 0);
    }

    #[test]
    fn test_unauthenticated_redirects_once() {
        let mut g = guard(RoleRequirement::AnyAuthenticated);
        let now = Utc::now();
        assert_eq!(g.observe(&Session::unauthenticated(), now), redirect());
        assert_eq!(g.observe(&Session::unauthenticated(), now), GuardAction::Blocked);
        assert_eq!(g.observe(&Session::unauthenticated(), now), GuardAction::Blocked);
        assert_eq!(g.redirect_count(), 1);
    }

    #[test]
    fn test_allowed_role_renders() {
        let mut g = guard(RoleRequirement::AtLeast(Role::Employee));
        let session = Session::authenticated("e-1", Some(Role::Manager));
        assert_eq!(g.observe(&session, Utc::now()), GuardAction::Render);
        assert_eq!(g.state(), GuardState::Authenticated(Some(Role::Manager)));
    }

    #[test]
    fn test_disallowed_role_redirects_once() {
        let mut g = guard(RoleRequirement::AtLeast(Role::Admin));
        let session = Session::authenticated("e-1", Some(Role::Employee));
        assert_eq!(g.observe(&session, Utc::now()), redirect());
        assert_eq!(g.observe(&session, Utc::now()), GuardAction::Blocked);
        assert_eq!(g.redirect_count(), 1);
    }

    #[test]
    fn test_missing_role_fails_closed_for_role_pages() {
        let session = Session::authenticated("someone", None);
        assert_eq!(guard(RoleRequirement::AtLeast(Role::User)).observe(&session, Utc::now()), redirect());
        assert_eq!(guard(RoleRequirement::AnyAuthenticated).observe(&session, Utc::now()), GuardAction::Render);
    }

    #[test]
    fn test_one_of_is_exact_membership() {
        let requirement = RoleRequirement::OneOf(vec![Role::Employee, Role::Admin]);
        assert!(requirement.allows(Some(Role::Employee)));
        assert!(!requirement.allows(Some(Role::Manager)));
        assert!(!requirement.allows(None));
    }

    #[test]
    fn test_sign_out_redirects_once() {
        let mut g = guard(RoleRequirement::AnyAuthenticated);
        let now = Utc::now();
        let session = Session::authenticated("u", Some(Role::User));
        assert_eq!(g.observe(&session, now), GuardAction::Render);
        assert_eq!(g.sign_out(), redirect());
        assert_eq!(g.sign_out(), GuardAction::Blocked);
        assert_eq!(g.state(), GuardState::Unauthenticated);
    }

    #[test]
    fn test_expiry_detected_on_observation() {
        let mut g = guard(RoleRequirement::AnyAuthenticated);
        let now = Utc::now();
        let session = Session::authenticated("u", Some(Role::User)).with_expiry(now + Duration::seconds(30));

        assert_eq!(g.observe(&session, now), GuardAction::Render);
        assert_eq!(g.observe(&session, now + Duration::seconds(30)), redirect());
        assert_eq!(g.observe(&session, now + Duration::seconds(60)), GuardAction::Blocked);
    }

    #[test]
    fn test_never_returns_to_loading() {
        let mut g = guard(RoleRequirement::AnyAuthenticated);
        let now = Utc::now();
        assert_eq!(g.observe(&Session::unauthenticated(), now), redirect());
        assert_eq!(g.observe(&Session::loading(), now), GuardAction::Blocked);
        assert_eq!(g.state(), GuardState::Unauthenticated);
    }

    #[test]
    fn test_new_transition_allows_new_redirect() {
        let mut g = guard(RoleRequirement::AtLeast(Role::Manager));
        let now = Utc::now();
        assert_eq!(g.observe(&Session::authenticated("u", Some(Role::Employee)), now), redirect());
        assert_eq!(g.observe(&Session::unauthenticated(), now), redirect());
        assert_eq!(g.redirect_count(), 2);
    }
}
