//! A page visit: one guard, one provider, bound to the page's lifetime.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use marquee_core::{Session, SessionError, Timestamp};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::guard::{GuardAction, PagePolicy, SessionGuard};
use crate::provider::IdentityProvider;

/// Ends a page visit. Calling [`teardown`](Self::teardown) or dropping the
/// handle both cancel any pending resolution.
#[derive(Debug)]
pub struct TeardownHandle {
    tx: watch::Sender<bool>,
}

impl TeardownHandle {
    pub fn teardown(self) {
        // No receivers left means the visit is already gone.
        let _ = self.tx.send(true);
    }
}

pub struct PageVisit {
    guard: SessionGuard,
    provider: Arc<dyn IdentityProvider>,
    session: Session,
    resolve_timeout: Duration,
    teardown: watch::Receiver<bool>,
}

impl std::fmt::Debug for PageVisit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageVisit")
            .field("guard", &self.guard)
            .field("session", &self.session)
            .field("resolve_timeout", &self.resolve_timeout)
            .finish_non_exhaustive()
    }
}

impl PageVisit {
    /// Begin a visit in `Loading`.
    pub fn start(
        provider: Arc<dyn IdentityProvider>,
        policy: PagePolicy,
        resolve_timeout: Duration,
    ) -> (Self, TeardownHandle) {
        let (tx, rx) = watch::channel(false);
        let visit = Self {
            guard: SessionGuard::new(policy),
            provider,
            session: Session::loading(),
            resolve_timeout,
            teardown: rx,
        };
        (visit, TeardownHandle { tx })
    }

    pub fn current(&self) -> &Session {
        &self.session
    }

    pub fn guard(&self) -> &SessionGuard {
        &self.guard
    }

    pub fn is_torn_down(&self) -> bool {
        *self.teardown.borrow() || self.teardown.has_changed().is_err()
    }

    /// Resolve the session and feed it to the guard.
    ///
    /// Returns `None` when the page was torn down before the resolution
    /// finished; the result is then discarded. A failed or timed-out
    /// resolution counts as unauthenticated.
    pub async fn resolve(&mut self) -> Option<GuardAction> {
        if self.is_torn_down() {
            return None;
        }

        let provider = Arc::clone(&self.provider);
        let limit = self.resolve_timeout;
        let resolution = async move {
            match tokio::time::timeout(limit, provider.resolve()).await {
                Ok(result) => result,
                Err(_) => Err(SessionError::Timeout {
                    timeout_ms: limit.as_millis() as u64,
                }),
            }
        };

        let outcome = tokio::select! {
            _ = torn_down(&mut self.teardown) => {
                debug!("Page torn down during session resolution; discarding result");
                return None;
            }
            outcome = resolution => outcome,
        };

        if self.is_torn_down() {
            return None;
        }

        self.session = outcome.unwrap_or_else(|e| {
            warn!(error = %e, "Session resolution failed; treating visitor as unauthenticated");
            Session::unauthenticated()
        });
        Some(self.guard.observe(&self.session, Utc::now()))
    }

    /// Re-run the guard against the current session, e.g. on a timer to
    /// catch expiry.
    pub fn reevaluate(&mut self, now: Timestamp) -> Option<GuardAction> {
        if self.is_torn_down() {
            return None;
        }
        Some(self.guard.observe(&self.session, now))
    }

    pub fn sign_out(&mut self) -> Option<GuardAction> {
        if self.is_torn_down() {
            return None;
        }
        self.session = Session::unauthenticated();
        Some(self.guard.sign_out())
    }
}

async fn torn_down(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        // Sender dropped: the handle is gone, so is the page.
        if rx.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::{GuardState, RoleRequirement};
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use marquee_core::{Role, SessionStatus};
    use tokio::sync::Notify;

    /// Holds its answer until released.
    struct GatedProvider {
        gate: Arc<Notify>,
        answer: Result<Session, SessionError>,
    }

    #[async_trait]
    impl IdentityProvider for GatedProvider {
        async fn resolve(&self) -> Result<Session, SessionError> {
            self.gate.notified().await;
            self.answer.clone()
        }
    }

    struct FixedProvider(Result<Session, SessionError>);

    #[async_trait]
    impl IdentityProvider for FixedProvider {
        async fn resolve(&self) -> Result<Session, SessionError> {
            self.0.clone()
        }
    }

    fn policy(requirement: RoleRequirement) -> PagePolicy {
        PagePolicy::new(requirement, "/login")
    }

    fn redirect() -> GuardAction {
        GuardAction::Redirect {
            to: "/login".to_string(),
        }
    }

    #[tokio::test]
    async fn test_starts_loading() {
        let provider = Arc::new(FixedProvider(Ok(Session::unauthenticated())));
        let (visit, _handle) = PageVisit::start(provider, policy(RoleRequirement::AnyAuthenticated), Duration::from_secs(1));
        assert_eq!(visit.current().status, SessionStatus::Loading);
        assert_eq!(visit.guard().state(), GuardState::Loading);
    }

    #[tokio::test]
    async fn test_authenticated_visit_renders() {
        let session = Session::authenticated("admin-1", Some(Role::Admin));
        let provider = Arc::new(FixedProvider(Ok(session)));
        let (mut visit, _handle) =
            PageVisit::start(provider, policy(RoleRequirement::AtLeast(Role::Manager)), Duration::from_secs(1));

        assert_eq!(visit.resolve().await, Some(GuardAction::Render));
        assert_eq!(visit.current().role, Some(Role::Admin));
    }

    #[tokio::test]
    async fn test_failed_resolution_redirects() {
        let provider = Arc::new(FixedProvider(Err(SessionError::ResolutionFailed {
            reason: "connection refused".to_string(),
        })));
        let (mut visit, _handle) = PageVisit::start(provider, policy(RoleRequirement::AnyAuthenticated), Duration::from_secs(1));

        assert_eq!(visit.resolve().await, Some(redirect()));
        assert_eq!(visit.current().status, SessionStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn test_timed_out_resolution_redirects() {
        let provider = Arc::new(GatedProvider {
            gate: Arc::new(Notify::new()),
            answer: Ok(Session::authenticated("late", Some(Role::Admin))),
        });
        let (mut visit, _handle) =
            PageVisit::start(provider, policy(RoleRequirement::AnyAuthenticated), Duration::from_millis(50));

        assert_eq!(visit.resolve().await, Some(redirect()));
        assert_eq!(visit.guard().redirect_count(), 1);
    }

    #[tokio::test]
    async fn test_teardown_during_resolution_discards_result() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(GatedProvider {
            gate: Arc::clone(&gate),
            answer: Ok(Session::unauthenticated()),
        });
        let (mut visit, handle) = PageVisit::start(provider, policy(RoleRequirement::AnyAuthenticated), Duration::from_secs(5));

        let task = tokio::spawn(async move {
            let action = visit.resolve().await;
            (action, visit)
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.teardown();
        gate.notify_one();

        let (action, visit) = task.await.unwrap();
        assert_eq!(action, None);
        assert_eq!(visit.guard().redirect_count(), 0);
        assert_eq!(visit.current().status, SessionStatus::Loading);
    }

    #[tokio::test]
    async fn test_dropped_handle_tears_down() {
        let provider = Arc::new(FixedProvider(Ok(Session::unauthenticated())));
        let (mut visit, handle) = PageVisit::start(provider, policy(RoleRequirement::AnyAuthenticated), Duration::from_secs(1));
        drop(handle);

        assert!(visit.is_torn_down());
        assert_eq!(visit.resolve().await, None);
        assert_eq!(visit.reevaluate(Utc::now()), None);
        assert_eq!(visit.sign_out(), None);
        assert_eq!(visit.guard().redirect_count(), 0);
    }

    #[tokio::test]
    async fn test_reevaluate_detects_expiry_then_blocks() {
        let now = Utc::now();
        let session = Session::authenticated("u", Some(Role::User)).with_expiry(now + ChronoDuration::minutes(5));
        let provider = Arc::new(FixedProvider(Ok(session)));
        let (mut visit, _handle) = PageVisit::start(provider, policy(RoleRequirement::AnyAuthenticated), Duration::from_secs(1));

        assert_eq!(visit.resolve().await, Some(GuardAction::Render));
        assert_eq!(visit.reevaluate(now + ChronoDuration::minutes(10)), Some(redirect()));
        assert_eq!(visit.reevaluate(now + ChronoDuration::minutes(11)), Some(GuardAction::Blocked));
    }

    #[tokio::test]
    async fn test_sign_out_redirects_once() {
        let provider = Arc::new(FixedProvider(Ok(Session::authenticated("u", Some(Role::Employee)))));
        let (mut visit, _handle) = PageVisit::start(provider, policy(RoleRequirement::AnyAuthenticated), Duration::from_secs(1));

        assert_eq!(visit.resolve().await, Some(GuardAction::Render));
        assert_eq!(visit.sign_out(), Some(redirect()));
        assert_eq!(visit.reevaluate(Utc::now()), Some(GuardAction::Blocked));
        assert_eq!(visit.current().status, SessionStatus::Unauthenticated);
    }
}
