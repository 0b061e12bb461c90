//! Property-Based Tests for the Session Guard
//!
//! - while the session is loading the guard never redirects
//! - each transition into a rejected state produces exactly one redirect,
//!   however many times the page re-evaluates afterwards

use chrono::Utc;
use marquee_core::{Role, Session, SessionStatus};
use marquee_session::{GuardAction, GuardState, PagePolicy, RoleRequirement, SessionGuard};
use marquee_test_utils::generators::{arb_resolved_session, arb_role, arb_session_status};
use proptest::prelude::*;

fn arb_requirement() -> impl Strategy<Value = RoleRequirement> {
    prop_oneof![
        Just(RoleRequirement::AnyAuthenticated),
        arb_role().prop_map(RoleRequirement::AtLeast),
        prop::collection::vec(arb_role(), 0..4).prop_map(RoleRequirement::OneOf),
    ]
}

fn guard_state(session: &Session) -> GuardState {
    match session.status {
        SessionStatus::Loading => GuardState::Loading,
        SessionStatus::Unauthenticated => GuardState::Unauthenticated,
        SessionStatus::Authenticated => GuardState::Authenticated(session.role),
    }
}

fn accepted(requirement: &RoleRequirement, session: &Session) -> bool {
    session.status == SessionStatus::Authenticated && requirement.allows(session.role)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_loading_never_redirects(requirement in arb_requirement(), observations in 1usize..20) {
        let mut guard = SessionGuard::new(PagePolicy::new(requirement, "/login"));
        for _ in 0..observations {
            prop_assert_eq!(guard.observe(&Session::loading(), Utc::now()), GuardAction::Wait);
        }
        prop_assert_eq!(guard.redirect_count(), 0);
        prop_assert_eq!(guard.state(), GuardState::Loading);
    }

    #[test]
    fn prop_one_redirect_per_rejected_transition(
        requirement in arb_requirement(),
        leading_loads in 0usize..5,
        steps in prop::collection::vec((arb_resolved_session(), 1usize..5), 1..12),
    ) {
        let mut guard = SessionGuard::new(PagePolicy::new(requirement.clone(), "/login"));
        let now = Utc::now();
        for _ in 0..leading_loads {
            prop_assert_eq!(guard.observe(&Session::loading(), now), GuardAction::Wait);
        }

        let mut expected_redirects = 0u64;
        let mut previous: Option<GuardState> = None;
        for (session, repeats) in &steps {
            let state = guard_state(session);
            let is_new_state = previous != Some(state);
            for i in 0..*repeats {
                let action = guard.observe(session, now);
                if accepted(&requirement, session) {
                    prop_assert_eq!(action, GuardAction::Render);
                } else if i == 0 && is_new_state {
                    expected_redirects += 1;
                    prop_assert_eq!(action, GuardAction::Redirect { to: "/login".to_string() });
                } else {
                    prop_assert_eq!(action, GuardAction::Blocked);
                }

                // Loading is never re-entered once resolved.
                prop_assert_ne!(guard.observe(&Session::loading(), now), GuardAction::Wait);
            }
            previous = Some(state);
        }
        prop_assert_eq!(guard.redirect_count(), expected_redirects);
    }

    #[test]
    fn prop_redirects_bounded_by_transitions(
        statuses in prop::collection::vec(arb_session_status(), 1..30),
        role in proptest::option::of(arb_role()),
    ) {
        let mut guard = SessionGuard::new(PagePolicy::new(RoleRequirement::AtLeast(Role::Manager), "/login"));
        let now = Utc::now();
        let mut transitions = 0u64;
        let mut last = guard.state();
        for status in statuses {
            let session = match status {
                SessionStatus::Loading => Session::loading(),
                SessionStatus::Unauthenticated => Session::unauthenticated(),
                SessionStatus::Authenticated => Session::authenticated("s", role),
            };
            let action = guard.observe(&session, now);
            if guard.state() != last {
                transitions += 1;
                last = guard.state();
            }
            if guard.state() == GuardState::Loading {
                prop_assert_eq!(action, GuardAction::Wait);
            }
        }
        prop_assert!(guard.redirect_count() <= transitions);
    }

    #[test]
    fn prop_at_least_matches_rank(holder in arb_role(), required in arb_role()) {
        let requirement = RoleRequirement::AtLeast(required);
        prop_assert_eq!(requirement.allows(Some(holder)), holder.rank() >= required.rank());
        prop_assert!(!requirement.allows(None));
    }
}

#[test]
fn admin_page_redirects_employee_once() {
    let mut guard = SessionGuard::new(PagePolicy::new(RoleRequirement::AtLeast(Role::Admin), "/login"));
    let now = Utc::now();
    let employee = Session::authenticated("e-7", Some(Role::Employee));

    assert_eq!(guard.observe(&Session::loading(), now), GuardAction::Wait);
    assert_eq!(
        guard.observe(&employee, now),
        GuardAction::Redirect { to: "/login".to_string() }
    );
    for _ in 0..10 {
        assert_eq!(guard.observe(&employee, now), GuardAction::Blocked);
    }
    assert_eq!(guard.redirect_count(), 1);
}
