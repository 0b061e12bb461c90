//! Marquee Test Utilities
//!
//! Shared test infrastructure for the marquee workspace:
//! - A scripted content store with call counting, latency and failure injection
//! - Proptest generators for roles, section keys and content maps
//! - Fixtures for the common hero/footer scenarios
//! - Assertions for snapshot and authorization outcomes

pub use marquee_storage::{ContentCache, ContentCacheConfig, InMemoryContentStore};

pub use marquee_core::{
    AuthorizationError, ContentMap, ContentSection, ReadSource, Role, Session, SessionStatus,
    Snapshot, SnapshotSource, StoreError, Timestamp,
};

use async_trait::async_trait;
use marquee_storage::ContentStore;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

// ============================================================================
// SCRIPTED STORE
// ============================================================================

/// Content store whose behavior a test controls.
///
/// Counts every `fetch_all_sections` call, optionally sleeps before
/// answering, and can be switched into a failing mode at any time.
#[derive(Debug, Default)]
pub struct ScriptedContentStore {
    sections: Mutex<Vec<ContentSection>>,
    fetches: AtomicUsize,
    pings: AtomicUsize,
    failing: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl ScriptedContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `content`.
    pub fn with_content(content: &ContentMap) -> Self {
        let sections = content
            .iter()
            .map(|(key, payload)| ContentSection::new(key.clone(), payload.clone(), "fixture"))
            .collect();
        Self {
            sections: Mutex::new(sections),
            ..Self::default()
        }
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.set_delay(Some(delay));
        self
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of store reads so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of connectivity checks so far.
    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    async fn answer(&self) -> Result<(), StoreError> {
        let delay = *self.delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                reason: "scripted store failure".to_string(),
            });
        }
        Ok(())
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl ContentStore for ScriptedContentStore {
    async fn fetch_all_sections(&self) -> Result<Vec<ContentSection>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.answer().await?;
        Ok(self
            .sections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn upsert_section(&self, section: &ContentSection) -> Result<(), StoreError> {
        let mut sections = self.sections.lock().unwrap_or_else(PoisonError::into_inner);
        sections.retain(|s| s.key != section.key);
        sections.push(section.clone());
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        self.answer().await
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for marquee types.

    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    /// Any of the four roles.
    pub fn arb_role() -> impl Strategy<Value = Role> {
        prop::sample::select(Role::ALL.to_vec())
    }

    /// A role string as it might arrive on the wire: known roles in mixed
    /// case, plus garbage.
    pub fn arb_role_string() -> impl Strategy<Value = String> {
        prop_oneof![
            arb_role().prop_map(|r| r.as_str().to_string()),
            arb_role().prop_map(|r| r.as_str().to_uppercase()),
            "[a-z]{1,10}",
        ]
    }

    /// A stable section key like `hero` or `pricing_table`.
    pub fn arb_section_key() -> impl Strategy<Value = String> {
        "[a-z][a-z_]{0,15}"
    }

    /// A small structured payload.
    pub fn arb_payload() -> impl Strategy<Value = Value> {
        prop_oneof![
            "[ -~]{0,32}".prop_map(|title| json!({ "title": title })),
            any::<i32>().prop_map(|year| json!({ "year": year })),
            prop::collection::vec("[a-z]{1,8}", 0..4).prop_map(|items| json!({ "items": items })),
        ]
    }

    /// A non-empty content map.
    pub fn arb_content_map() -> impl Strategy<Value = ContentMap> {
        prop::collection::hash_map(arb_section_key(), arb_payload(), 1..8)
    }

    /// A session status.
    pub fn arb_session_status() -> impl Strategy<Value = SessionStatus> {
        prop_oneof![
            Just(SessionStatus::Loading),
            Just(SessionStatus::Unauthenticated),
            Just(SessionStatus::Authenticated),
        ]
    }

    /// A resolved (non-loading) session.
    pub fn arb_resolved_session() -> impl Strategy<Value = Session> {
        prop_oneof![
            Just(Session::unauthenticated()),
            ("[a-z0-9]{4,12}", proptest::option::of(arb_role()))
                .prop_map(|(subject, role)| Session::authenticated(subject, role)),
        ]
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built content for common scenarios.

    use super::*;
    use serde_json::json;

    pub fn hero_content(title: &str) -> ContentMap {
        ContentMap::from([("hero".to_string(), json!({ "title": title }))])
    }

    pub fn footer_content(year: i64) -> ContentMap {
        ContentMap::from([("footer".to_string(), json!({ "year": year }))])
    }

    /// A cache over a scripted store, returned together so tests can count
    /// store reads.
    pub fn cache_over(store: ScriptedContentStore) -> (ContentCache, Arc<ScriptedContentStore>) {
        let store = store.into_shared();
        let cache = ContentCache::with_defaults(store.clone());
        (cache, store)
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for marquee-specific outcomes.

    use super::*;

    /// Assert that a snapshot holds exactly `expected`, tagged with `source`.
    #[track_caller]
    pub fn assert_snapshot(snapshot: &Snapshot, expected: &ContentMap, source: SnapshotSource) {
        assert_eq!(snapshot.sections(), expected, "snapshot content mismatch");
        assert_eq!(snapshot.source(), source, "snapshot source mismatch");
    }

    /// Assert that an authorization result is a denial below `required`.
    #[track_caller]
    pub fn assert_denied(result: &Result<(), AuthorizationError>, required: Role) {
        match result {
            Err(err) => assert_eq!(err.required(), required),
            Ok(()) => panic!("Expected denial for required role {}", required),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixtures::*;

    #[tokio::test]
    async fn test_scripted_store_counts_and_fails() {
        let store = ScriptedContentStore::with_content(&footer_content(2024));
        assert_eq!(store.fetch_all_sections().await.unwrap().len(), 1);
        store.set_failing(true);
        assert!(store.fetch_all_sections().await.is_err());
        assert_eq!(store.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_cache_over_hydrates_fixture() {
        let (cache, store) = cache_over(ScriptedContentStore::with_content(&hero_content("A")));
        let snapshot = cache.hydrate_from_store().await.unwrap();
        assertions::assert_snapshot(&snapshot, &hero_content("A"), SnapshotSource::Database);
        assert_eq!(store.fetch_count(), 1);
    }
}
