//! Marquee Session - page-level session guarding.
//!
//! A page starts a [`PageVisit`], which resolves the visitor's session
//! through an [`IdentityProvider`] and feeds every observation to a
//! [`SessionGuard`]. The guard decides whether to wait, render or redirect.

pub mod config;
pub mod guard;
pub mod provider;
pub mod visit;

pub use config::{ClientCredentials, SessionConfig};
pub use guard::{GuardAction, GuardState, PagePolicy, RoleRequirement, SessionGuard};
pub use provider::{HttpIdentityProvider, IdentityProvider};
pub use visit::{PageVisit, TeardownHandle};
