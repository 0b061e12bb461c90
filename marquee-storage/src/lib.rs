//! Marquee Storage - Store Collaborators and Content Cache
//!
//! Defines the persistent store abstraction the cache hydrates from, the
//! in-process [`ContentCache`] itself, and the administrator bootstrap.
//! The Postgres implementation of the store traits lives in marquee-api.

pub mod bootstrap;
pub mod cache;
pub mod store;

pub use bootstrap::{bootstrap_admin, hash_password, verify_password, BootstrapError};
pub use cache::{CacheStats, ContentCache, ContentCacheConfig, HydrateHook, SingleFlight};
pub use store::{AccountStore, ContentStore, InMemoryContentStore};
