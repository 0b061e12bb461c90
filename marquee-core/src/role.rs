//! Role hierarchy
//!
//! Four fixed roles with strictly increasing ranks. A higher rank carries
//! every permission of the ranks below it.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Shared rank table, exposed for clients that mirror the hierarchy.
pub const ROLE_RANKS: [(&str, u8); 4] = [("user", 1), ("employee", 2), ("manager", 3), ("admin", 4)];

/// Principal role. Variant order matches rank order, so the derived `Ord`
/// agrees with [`Role::rank`].
///
/// Serialized lowercase. Deserialization goes through [`FromStr`], so a
/// JSON body accepts exactly the spellings a credential claim does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Employee,
    Manager,
    Admin,
}

impl Role {
    /// Every role, lowest rank first.
    pub const ALL: [Role; 4] = [Role::User, Role::Employee, Role::Manager, Role::Admin];

    /// Integer rank, 1 (user) through 4 (admin).
    pub fn rank(self) -> u8 {
        match self {
            Role::User => 1,
            Role::Employee => 2,
            Role::Manager => 3,
            Role::Admin => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Employee => "employee",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }

    pub fn from_rank(rank: u8) -> Option<Role> {
        Role::ALL.into_iter().find(|role| role.rank() == rank)
    }

    /// True when this role carries at least the permissions of `required`.
    pub fn includes(self, required: Role) -> bool {
        self.rank() >= required.rank()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "employee" => Ok(Role::Employee),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            _ => Err(RoleParseError(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Error when parsing an unrecognized role string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid role: {0}")]
pub struct RoleParseError(pub String);
