//! CacheSyncGateway: the only externally reachable surface for reading and
//! refreshing site content.
//!
//! Reads are served from the [`ContentCache`], hydrating from the store on a
//! cold cache. Pushes are validated first and authorized second; a rejected
//! push never touches the cache. The gateway installs exactly what it was
//! given and does not reconcile pushes against the store.

use std::sync::Arc;

use marquee_core::{
    ContentMap, MarqueeResult, PermissionGate, ReadSource, Role, Snapshot, StoreError, Timestamp,
    ValidationError,
};
use marquee_storage::{CacheStats, ContentCache};
use serde_json::Value;
use tracing::{info, warn};

use crate::telemetry::{metrics, PushOutcome};

/// Minimum role required to push content.
pub const PUSH_ROLE: Role = Role::Admin;

/// Name of the push body field holding the content mapping.
pub const CONTENT_FIELD: &str = "content";

// ============================================================================
// READ RESULTS
// ============================================================================

/// Outcome of a full-content read.
#[derive(Debug, Clone)]
pub struct ContentRead {
    pub source: ReadSource,
    /// `None` only when `source` is [`ReadSource::Unavailable`].
    pub snapshot: Option<Arc<Snapshot>>,
    pub error: Option<StoreError>,
}

impl ContentRead {
    pub fn is_available(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Content for the response body; empty when unavailable.
    pub fn content(&self) -> ContentMap {
        self.snapshot
            .as_ref()
            .map(|s| s.sections().clone())
            .unwrap_or_default()
    }
}

/// Outcome of a single-section read.
#[derive(Debug, Clone)]
pub struct SectionRead {
    pub source: ReadSource,
    pub payload: Option<Value>,
    /// When the snapshot consulted was taken.
    pub taken_at: Option<Timestamp>,
    pub error: Option<StoreError>,
}

/// Receipt for an applied push.
#[derive(Debug, Clone)]
pub struct PushReceipt {
    pub snapshot: Arc<Snapshot>,
}

impl PushReceipt {
    pub fn section_count(&self) -> usize {
        self.snapshot.len()
    }
}

// ============================================================================
// GATEWAY
// ============================================================================

/// Read/push boundary over one process-wide [`ContentCache`].
#[derive(Debug, Clone)]
pub struct CacheSyncGateway {
    cache: ContentCache,
}

impl CacheSyncGateway {
    /// Wraps `cache` and reports its store reads to the hydration metric.
    pub fn new(cache: ContentCache) -> Self {
        cache.set_hydrate_hook(Arc::new(|success| {
            if let Some(m) = metrics() {
                m.record_hydration(success);
            }
        }));
        Self { cache }
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    /// Current snapshot if populated, otherwise the result of one hydrate.
    /// A populated cache never reaches the store.
    async fn current_or_hydrate(&self) -> (ReadSource, Result<Arc<Snapshot>, StoreError>) {
        if let Some(snapshot) = self.cache.get_all() {
            return (ReadSource::Cache, Ok(snapshot));
        }

        let result = self.cache.hydrate_from_store().await;
        match &result {
            Ok(snapshot) => (ReadSource::from(snapshot.source()), result),
            Err(e) => {
                warn!(error = %e, "Content unavailable: hydrate failed on cold cache");
                (ReadSource::Unavailable, result)
            }
        }
    }

    /// Read all content.
    pub async fn read(&self) -> ContentRead {
        let (source, result) = self.current_or_hydrate().await;
        record_read(source);
        match result {
            Ok(snapshot) => ContentRead {
                source,
                snapshot: Some(snapshot),
                error: None,
            },
            Err(e) => ContentRead {
                source: ReadSource::Unavailable,
                snapshot: None,
                error: Some(e),
            },
        }
    }

    /// Read one section, hydrating on a cold cache.
    pub async fn read_section(&self, key: &str) -> SectionRead {
        let (source, result) = self.current_or_hydrate().await;
        record_read(source);
        match result {
            Ok(snapshot) => SectionRead {
                source,
                payload: snapshot.get(key).cloned(),
                taken_at: Some(snapshot.taken_at()),
                error: None,
            },
            Err(e) => SectionRead {
                source: ReadSource::Unavailable,
                payload: None,
                taken_at: None,
                error: Some(e),
            },
        }
    }

    /// Replace the cache with the `content` mapping from `body`.
    ///
    /// The body is validated before the caller is authorized, so a malformed
    /// push from any caller is a validation error. Either failure leaves the
    /// cache untouched.
    pub fn push(
        &self,
        subject: &str,
        principal_role: Option<&str>,
        body: Option<&Value>,
    ) -> MarqueeResult<PushReceipt> {
        let content = match validate_push_body(body) {
            Ok(content) => content,
            Err(e) => {
                record_push(PushOutcome::Invalid);
                warn!(subject, field = e.field(), error = %e, "Rejected malformed push");
                return Err(e.into());
            }
        };

        if let Err(denied) = PermissionGate::authorize(principal_role, PUSH_ROLE) {
            record_push(PushOutcome::Denied);
            warn!(
                subject,
                role = principal_role.unwrap_or("-"),
                error = %denied,
                "Push denied"
            );
            return Err(denied.into());
        }

        let snapshot = self.cache.replace_all(content);
        record_push(PushOutcome::Applied);
        info!(subject, sections = snapshot.len(), "Push applied");
        Ok(PushReceipt { snapshot })
    }

    /// [`push`](Self::push) from a raw request body. An empty body counts as
    /// a missing `content` field; unparseable JSON is an invalid one.
    pub fn push_json(
        &self,
        subject: &str,
        principal_role: Option<&str>,
        raw: &[u8],
    ) -> MarqueeResult<PushReceipt> {
        match parse_push_body(raw) {
            Ok(body) => self.push(subject, principal_role, body.as_ref()),
            Err(e) => {
                record_push(PushOutcome::Invalid);
                warn!(subject, error = %e, "Rejected unparseable push body");
                Err(e.into())
            }
        }
    }

    /// Drop the current snapshot; the next read hydrates from the store.
    pub fn reset(&self, subject: &str) {
        self.cache.reset();
        info!(subject, "Content cache reset requested");
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

fn record_read(source: ReadSource) {
    if let Some(m) = metrics() {
        m.record_content_read(source);
    }
}

fn record_push(outcome: PushOutcome) {
    if let Some(m) = metrics() {
        m.record_push(outcome);
    }
}

// ============================================================================
// PUSH VALIDATION
// ============================================================================

/// Decode a raw push body. Whitespace-only bodies are absent, not invalid.
pub fn parse_push_body(raw: &[u8]) -> Result<Option<Value>, ValidationError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(raw)
        .map(Some)
        .map_err(|e| ValidationError::InvalidValue {
            field: CONTENT_FIELD.to_string(),
            reason: format!("request body is not valid JSON: {}", e),
        })
}

/// Extract and check the `content` mapping of a push body.
///
/// - body or `content` absent / null: `RequiredFieldMissing("content")`
/// - `content` not an object: `InvalidValue("content")`
/// - `content` empty: `Empty("content")`
/// - blank key: `InvalidValue("content")`
/// - null payload: `InvalidValue("content.<key>")`
pub fn validate_push_body(body: Option<&Value>) -> Result<ContentMap, ValidationError> {
    let missing = || ValidationError::RequiredFieldMissing {
        field: CONTENT_FIELD.to_string(),
    };

    let content = match body {
        Some(Value::Object(fields)) => fields.get(CONTENT_FIELD),
        Some(Value::Null) | None => None,
        Some(_) => {
            return Err(ValidationError::InvalidValue {
                field: CONTENT_FIELD.to_string(),
                reason: "request body must be an object with a content field".to_string(),
            })
        }
    };

    let map = match content {
        None | Some(Value::Null) => return Err(missing()),
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(ValidationError::InvalidValue {
                field: CONTENT_FIELD.to_string(),
                reason: "must be a mapping of section keys to payloads".to_string(),
            })
        }
    };

    if map.is_empty() {
        return Err(ValidationError::Empty {
            field: CONTENT_FIELD.to_string(),
        });
    }

    let mut content = ContentMap::with_capacity(map.len());
    for (key, payload) in map {
        if key.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: CONTENT_FIELD.to_string(),
                reason: "section keys must not be blank".to_string(),
            });
        }
        if payload.is_null() {
            return Err(ValidationError::InvalidValue {
                field: format!("{}.{}", CONTENT_FIELD, key),
                reason: "payload must not be null".to_string(),
            });
        }
        content.insert(key.clone(), payload.clone());
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_core::{AuthorizationError, MarqueeError, SnapshotSource};
    use marquee_test_utils::assertions::{assert_denied, assert_snapshot};
    use marquee_test_utils::fixtures::{cache_over, footer_content, hero_content};
    use marquee_test_utils::ScriptedContentStore;
    use serde_json::json;

    fn gateway_over(store: ScriptedContentStore) -> (CacheSyncGateway, Arc<ScriptedContentStore>) {
        let (cache, store) = cache_over(store);
        (CacheSyncGateway::new(cache), store)
    }

    #[tokio::test]
    async fn test_push_then_read_serves_pushed_content() {
        let (gateway, store) = gateway_over(ScriptedContentStore::new());

        let body = json!({ "content": { "hero": { "title": "A" } } });
        let receipt = gateway
            .push("admin-1", Some("admin"), Some(&body))
            .expect("admin push should apply");
        assert_eq!(receipt.section_count(), 1);
        assert_eq!(receipt.snapshot.source(), SnapshotSource::Cache);

        let read = gateway.read().await;
        assert_eq!(read.source, ReadSource::Cache);
        assert_eq!(read.content(), hero_content("A"));
        assert_eq!(store.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_cold_read_hydrates_then_serves_cache() {
        let (gateway, store) = gateway_over(ScriptedContentStore::with_content(&footer_content(2024)));

        let first = gateway.read().await;
        assert_eq!(first.source, ReadSource::Database);
        assert_eq!(first.content(), footer_content(2024));

        let second = gateway.read().await;
        assert_eq!(second.source, ReadSource::Cache);
        assert_eq!(second.content(), footer_content(2024));
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_cold_reads_report_one_hydration() {
        let (gateway, store) = gateway_over(
            ScriptedContentStore::with_content(&footer_content(2024)).with_delay(std::time::Duration::from_millis(50)),
        );
        // The gateway owns the cache's hydrate hook.
        assert!(!gateway.cache().set_hydrate_hook(Arc::new(|_| {})));

        let reads: Vec<_> = (0..8)
            .map(|_| {
                let gateway = gateway.clone();
                tokio::spawn(async move { gateway.read().await })
            })
            .collect();
        for read in reads {
            assert!(read.await.unwrap().is_available());
        }
        assert_eq!(store.fetch_count(), 1);
        assert_eq!(gateway.stats().hydrations, 1);
    }

    #[tokio::test]
    async fn test_empty_push_rejected_and_cache_unchanged() {
        let (gateway, _) = gateway_over(ScriptedContentStore::new());
        gateway
            .push("admin-1", Some("admin"), Some(&json!({ "content": { "hero": { "title": "A" } } })))
            .expect("seed push");

        let err = gateway
            .push("admin-1", Some("admin"), Some(&json!({ "content": {} })))
            .unwrap_err();
        assert!(matches!(
            err,
            MarqueeError::Validation(ValidationError::Empty { ref field }) if field == "content"
        ));

        assert_eq!(gateway.read().await.content(), hero_content("A"));
    }

    #[tokio::test]
    async fn test_manager_push_denied_and_cache_unchanged() {
        let (gateway, _) = gateway_over(ScriptedContentStore::with_content(&footer_content(2024)));
        assert_eq!(gateway.read().await.source, ReadSource::Database);

        let err = gateway
            .push("mgr-1", Some("manager"), Some(&json!({ "content": { "hero": {} } })))
            .unwrap_err();
        assert!(matches!(
            err,
            MarqueeError::Authorization(AuthorizationError::InsufficientRole {
                actual: Role::Manager,
                required: Role::Admin,
            })
        ));
        assert_eq!(gateway.read().await.content(), footer_content(2024));
    }

    #[tokio::test]
    async fn test_validation_precedes_authorization() {
        let (gateway, _) = gateway_over(ScriptedContentStore::new());
        let err = gateway.push("anon", None, None).unwrap_err();
        assert!(matches!(err, MarqueeError::Validation(_)));
        assert!(!gateway.cache().is_populated());
    }

    #[tokio::test]
    async fn test_unavailable_read_then_recovery() {
        let store = ScriptedContentStore::with_content(&hero_content("B"));
        store.set_failing(true);
        let (gateway, store) = gateway_over(store);

        let read = gateway.read().await;
        assert_eq!(read.source, ReadSource::Unavailable);
        assert!(!read.is_available());
        assert!(read.content().is_empty());
        assert!(read.error.is_some());

        store.set_failing(false);
        let read = gateway.read().await;
        assert_eq!(read.source, ReadSource::Database);
        assert_eq!(read.content(), hero_content("B"));
        assert_eq!(store.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_read_section_found_and_missing() {
        let (gateway, store) = gateway_over(ScriptedContentStore::with_content(&hero_content("C")));

        let hero = gateway.read_section("hero").await;
        assert_eq!(hero.source, ReadSource::Database);
        assert_eq!(hero.payload, Some(json!({ "title": "C" })));

        let missing = gateway.read_section("pricing").await;
        assert_eq!(missing.source, ReadSource::Cache);
        assert!(missing.payload.is_none());
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_reset_forces_rehydrate() {
        let (gateway, store) = gateway_over(ScriptedContentStore::with_content(&hero_content("D")));
        gateway
            .push("admin-1", Some("admin"), Some(&json!({ "content": { "hero": { "title": "pushed" } } })))
            .expect("push");

        gateway.reset("admin-1");
        let read = gateway.read().await;
        assert_eq!(read.source, ReadSource::Database);
        assert_eq!(read.content(), hero_content("D"));
        assert_eq!(gateway.stats().resets, 1);
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_push_json_rejects_garbage_and_blank_bodies() {
        let (gateway, _) = gateway_over(ScriptedContentStore::new());

        let err = gateway.push_json("admin-1", Some("admin"), b"{not json").unwrap_err();
        assert!(matches!(
            err,
            MarqueeError::Validation(ValidationError::InvalidValue { ref field, .. }) if field == "content"
        ));

        let err = gateway.push_json("admin-1", Some("admin"), b"  \n").unwrap_err();
        assert!(matches!(
            err,
            MarqueeError::Validation(ValidationError::RequiredFieldMissing { .. })
        ));
        assert!(!gateway.cache().is_populated());

        gateway
            .push_json("admin-1", Some("admin"), br#"{"content":{"hero":{"title":"A"}}}"#)
            .expect("well-formed push");
        assert_eq!(gateway.read().await.content(), hero_content("A"));
    }

    proptest::proptest! {
        #[test]
        fn prop_only_admin_push_lands_in_full(
            role in marquee_test_utils::generators::arb_role(),
            content in marquee_test_utils::generators::arb_content_map(),
        ) {
            let (gateway, _) = gateway_over(ScriptedContentStore::new());
            gateway.cache().replace_all(hero_content("before"));
            let body = json!({ "content": content.clone() });

            let result = gateway.push("editor", Some(role.as_str()), Some(&body));
            let current = gateway.cache().get_all().expect("populated");
            if role == Role::Admin {
                proptest::prop_assert!(result.is_ok());
                assert_snapshot(&current, &content, SnapshotSource::Cache);
            } else {
                proptest::prop_assert!(result.is_err());
                assert_denied(&PermissionGate::authorize(Some(role.as_str()), PUSH_ROLE), Role::Admin);
                proptest::prop_assert_eq!(current.sections(), &hero_content("before"));
            }
        }
    }

    #[test]
    fn test_validate_push_body_shapes() {
        let field = |r: Result<ContentMap, ValidationError>| r.unwrap_err().field().to_string();

        assert_eq!(field(validate_push_body(None)), "content");
        assert_eq!(field(validate_push_body(Some(&json!({})))), "content");
        assert_eq!(field(validate_push_body(Some(&json!({ "content": null })))), "content");
        assert_eq!(field(validate_push_body(Some(&json!({ "content": [1, 2] })))), "content");
        assert_eq!(field(validate_push_body(Some(&json!("hero")))), "content");
        assert_eq!(
            field(validate_push_body(Some(&json!({ "content": { "  ": {} } })))),
            "content"
        );
        assert_eq!(
            field(validate_push_body(Some(&json!({ "content": { "hero": null } })))),
            "content.hero"
        );

        let ok = validate_push_body(Some(&json!({ "content": { "hero": { "title": "A" }, "footer": 1 } })))
            .expect("valid body");
        assert_eq!(ok.len(), 2);
    }
}
