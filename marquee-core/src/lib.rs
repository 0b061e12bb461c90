//! Marquee Core - Shared Types
//!
//! Pure data structures and the role model shared by every other crate.
//! Nothing in here performs I/O: the cache, the HTTP gateway and the client
//! session guard all build on these types.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod account;
pub mod content;
pub mod error;
pub mod permission;
pub mod role;
pub mod session;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Entity identifier using UUIDv7 for timestamp-sortable IDs.
pub type EntityId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use account::{Account, AdminBootstrap, BootstrapOutcome};
pub use content::{ContentMap, ContentSection, ReadSource, Snapshot, SnapshotSource};
pub use error::{
    AuthorizationError, ConfigError, MarqueeError, MarqueeResult, SessionError, StoreError,
    ValidationError,
};
pub use permission::{Decision, PermissionGate};
pub use role::{Role, RoleParseError, ROLE_RANKS};
pub use session::{Session, SessionInfo, SessionStatus};
