//! Back-office accounts and administrator bootstrap inputs

use crate::role::Role;
use crate::{EntityId, Timestamp};
use serde::{Deserialize, Serialize};

/// A back-office account. Email is the unique identifying field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: EntityId,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    /// PHC-format password hash. Never serialized to clients.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Input for the idempotent administrator bootstrap.
#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub email: String,
    pub display_name: String,
    pub password: String,
    /// Replace the password of an existing account.
    pub reset_password: bool,
}

impl AdminBootstrap {
    /// Email as stored: trimmed and lowercased.
    pub fn normalized_email(&self) -> String {
        self.email.trim().to_ascii_lowercase()
    }
}

/// What a bootstrap run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// No account existed for the email; one was created.
    Created,
    /// An existing account was raised to admin and/or had its password reset.
    Promoted,
    /// The account was already an admin and nothing was changed.
    Unchanged,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_normalized_email() {
        let input = AdminBootstrap {
            email: "  Admin@Example.COM ".to_string(),
            display_name: "Admin".to_string(),
            password: "pw".to_string(),
            reset_password: false,
        };
        assert_eq!(input.normalized_email(), "admin@example.com");
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let account = Account {
            account_id: crate::new_entity_id(),
            email: "a@example.com".to_string(),
            display_name: "A".to_string(),
            role: Role::Admin,
            password_hash: "$argon2id$secret".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&account).unwrap();
        assert!(!json.contains("argon2id"));
    }
}
