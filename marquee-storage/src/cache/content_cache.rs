//! In-process content cache.
//!
//! Holds at most one immutable [`Snapshot`]. Readers load it lock-free; the
//! only mutations are whole-snapshot swaps (push, hydrate, reset), so a
//! reader sees either the old snapshot or the new one, never a mixture.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use marquee_core::{ContentMap, Snapshot, SnapshotSource, StoreError};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::single_flight::SingleFlight;
use super::stats::{AtomicCacheStats, CacheStats};
use crate::store::ContentStore;

const DEFAULT_HYDRATE_TIMEOUT_MS: u64 = 5_000;

/// Called once per store read made by a hydrate, with whether it succeeded.
pub type HydrateHook = Arc<dyn Fn(bool) + Send + Sync>;

/// Configuration for the content cache.
#[derive(Debug, Clone)]
pub struct ContentCacheConfig {
    /// Upper bound on one store read during hydrate.
    pub hydrate_timeout: Duration,
}

impl Default for ContentCacheConfig {
    fn default() -> Self {
        Self {
            hydrate_timeout: Duration::from_millis(DEFAULT_HYDRATE_TIMEOUT_MS),
        }
    }
}

impl ContentCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `MARQUEE_HYDRATE_TIMEOUT_MS`, falling back to the default.
    pub fn from_env() -> Self {
        let hydrate_timeout_ms = std::env::var("MARQUEE_HYDRATE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_HYDRATE_TIMEOUT_MS);
        Self {
            hydrate_timeout: Duration::from_millis(hydrate_timeout_ms),
        }
    }

    pub fn with_hydrate_timeout(mut self, timeout: Duration) -> Self {
        self.hydrate_timeout = timeout;
        self
    }
}

type HydrateOutcome = Result<Arc<Snapshot>, StoreError>;

struct CacheInner {
    current: ArcSwapOption<Snapshot>,
    /// Serializes installs so "install only if empty" is a single step.
    install_lock: Mutex<()>,
    store: Arc<dyn ContentStore>,
    hydrate_flight: SingleFlight<HydrateOutcome>,
    config: ContentCacheConfig,
    stats: AtomicCacheStats,
    on_hydrate: OnceLock<HydrateHook>,
}

impl CacheInner {
    fn install_guard(&self) -> MutexGuard<'_, ()> {
        self.install_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn hydrate_once(&self) -> HydrateOutcome {
        // A push or an earlier flight may have populated the cache while
        // this caller was queued.
        if let Some(snapshot) = self.current.load_full() {
            return Ok(snapshot);
        }

        AtomicCacheStats::bump(&self.stats.hydrations);
        info!("Hydrating content cache from store");

        let fetched =
            match tokio::time::timeout(self.config.hydrate_timeout, self.store.fetch_all_sections())
                .await
            {
                Ok(result) => result,
                Err(_) => Err(StoreError::Unavailable {
                    reason: format!(
                        "store read exceeded {}ms",
                        self.config.hydrate_timeout.as_millis()
                    ),
                }),
            };

        if let Some(hook) = self.on_hydrate.get() {
            hook(fetched.is_ok());
        }

        let sections = match fetched {
            Ok(sections) => sections,
            Err(e) => {
                AtomicCacheStats::bump(&self.stats.hydrate_failures);
                warn!(error = %e, "Content cache hydrate failed");
                return Err(e);
            }
        };

        let candidate = Arc::new(Snapshot::from_sections(sections));
        let _guard = self.install_guard();
        match self.current.load_full() {
            Some(existing) => {
                debug!("Cache populated during hydrate; keeping existing snapshot");
                Ok(existing)
            }
            None => {
                self.current.store(Some(Arc::clone(&candidate)));
                info!(sections = candidate.len(), "Installed snapshot from store");
                Ok(candidate)
            }
        }
    }
}

/// Process-wide content cache. Cloning shares the same underlying state.
#[derive(Clone)]
pub struct ContentCache {
    inner: Arc<CacheInner>,
}

impl std::fmt::Debug for ContentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCache")
            .field("populated", &self.is_populated())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl ContentCache {
    pub fn new(store: Arc<dyn ContentStore>, config: ContentCacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                current: ArcSwapOption::empty(),
                install_lock: Mutex::new(()),
                store,
                hydrate_flight: SingleFlight::new(),
                config,
                stats: AtomicCacheStats::default(),
                on_hydrate: OnceLock::new(),
            }),
        }
    }

    pub fn with_defaults(store: Arc<dyn ContentStore>) -> Self {
        Self::new(store, ContentCacheConfig::default())
    }

    /// Install the hydrate hook. Only the first hook sticks; returns false
    /// if one was already set.
    pub fn set_hydrate_hook(&self, hook: HydrateHook) -> bool {
        self.inner.on_hydrate.set(hook).is_ok()
    }

    pub fn config(&self) -> &ContentCacheConfig {
        &self.inner.config
    }

    /// The persistent store this cache hydrates from.
    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.inner.store
    }

    /// True once any snapshot is installed, even one with zero sections.
    pub fn is_populated(&self) -> bool {
        self.inner.current.load().is_some()
    }

    /// Look up one section in the current snapshot.
    pub fn get(&self, key: &str) -> Option<Value> {
        let current = self.inner.current.load();
        match &*current {
            Some(snapshot) => {
                AtomicCacheStats::bump(&self.inner.stats.hits);
                debug!(key, "Content cache hit");
                snapshot.get(key).cloned()
            }
            None => {
                AtomicCacheStats::bump(&self.inner.stats.misses);
                None
            }
        }
    }

    /// The current snapshot, shared rather than copied.
    pub fn get_all(&self) -> Option<Arc<Snapshot>> {
        let current = self.inner.current.load_full();
        if current.is_some() {
            AtomicCacheStats::bump(&self.inner.stats.hits);
        } else {
            AtomicCacheStats::bump(&self.inner.stats.misses);
        }
        current
    }

    /// Publish `content` as the new snapshot, tagged as pushed.
    pub fn replace_all(&self, content: ContentMap) -> Arc<Snapshot> {
        let snapshot = Arc::new(Snapshot::new(content, SnapshotSource::Cache));
        {
            let _guard = self.inner.install_guard();
            self.inner.current.store(Some(Arc::clone(&snapshot)));
        }
        AtomicCacheStats::bump(&self.inner.stats.replacements);
        info!(sections = snapshot.len(), "Installed pushed snapshot");
        snapshot
    }

    /// Install the store's content if the cache is empty.
    ///
    /// Concurrent callers share one store read and one outcome. A failure is
    /// returned to every waiting caller but not retained; an already
    /// populated cache is returned as-is without touching the store.
    pub async fn hydrate_from_store(&self) -> Result<Arc<Snapshot>, StoreError> {
        if let Some(snapshot) = self.inner.current.load_full() {
            return Ok(snapshot);
        }
        let inner = Arc::clone(&self.inner);
        self.inner
            .hydrate_flight
            .run(move || async move { inner.hydrate_once().await })
            .await
    }

    /// Drop the current snapshot so the next read hydrates again.
    pub fn reset(&self) {
        {
            let _guard = self.inner.install_guard();
            self.inner.current.store(None);
        }
        AtomicCacheStats::bump(&self.inner.stats.resets);
        info!("Content cache reset");
    }

    pub fn stats(&self) -> CacheStats {
        let section_count = self
            .inner
            .current
            .load_full()
            .map(|s| s.len() as u64)
            .unwrap_or(0);
        self.inner.stats.snapshot(section_count)
    }
}
