//! In-process content cache.
//!
//! One [`ContentCache`] per process, constructed at startup and injected
//! wherever content is read or pushed. Reads never wait on a lock; a cold
//! cache hydrates from the [`ContentStore`](crate::ContentStore) through a
//! single-flight so a burst of cold reads costs one store round trip.
//!
//! Nothing here replicates across processes. A multi-instance deployment
//! has to replay each push against every instance.

pub mod content_cache;
pub mod single_flight;
pub mod stats;

pub use content_cache::{ContentCache, ContentCacheConfig, HydrateHook};
pub use single_flight::SingleFlight;
pub use stats::CacheStats;
