//! Idempotent administrator bootstrap.
//!
//! Upserts a single admin account by email. Running it again is a no-op,
//! and it never deletes or replaces other accounts.

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use marquee_core::{
    new_entity_id, Account, AdminBootstrap, BootstrapOutcome, Role, StoreError, ValidationError,
};
use password_hash::{PasswordHash, SaltString};
use thiserror::Error;
use tracing::info;

use crate::store::AccountStore;

const MIN_PASSWORD_LEN: usize = 8;

/// Errors raised by [`bootstrap_admin`].
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Password hashing failed: {0}")]
    Hash(String),
}

/// Ensure an admin account exists for `input.email`.
///
/// - absent: created with role admin and a fresh Argon2 hash
/// - present, not admin: promoted; password kept unless `reset_password`
/// - present, admin: unchanged unless `reset_password`
pub async fn bootstrap_admin(
    store: &dyn AccountStore,
    input: &AdminBootstrap,
) -> Result<BootstrapOutcome, BootstrapError> {
    let email = input.normalized_email();
    validate(&email, input)?;

    let existing = store.account_by_email(&email).await?;
    let now = Utc::now();

    let Some(existing) = existing else {
        let account = Account {
            account_id: new_entity_id(),
            email: email.clone(),
            display_name: display_name_or_email(input, &email),
            role: Role::Admin,
            password_hash: hash_password(&input.password)?,
            created_at: now,
            updated_at: now,
        };
        store.upsert_account(&account).await?;
        info!(email = %email, "Created administrator account");
        return Ok(BootstrapOutcome::Created);
    };

    if existing.role == Role::Admin && !input.reset_password {
        info!(email = %email, "Administrator account already present");
        return Ok(BootstrapOutcome::Unchanged);
    }

    let password_hash = if input.reset_password {
        hash_password(&input.password)?
    } else {
        existing.password_hash.clone()
    };
    let previous_role = existing.role;
    let updated = Account {
        role: Role::Admin,
        password_hash,
        updated_at: now,
        ..existing
    };
    store.upsert_account(&updated).await?;
    info!(
        email = %email,
        previous_role = %previous_role,
        password_reset = input.reset_password,
        "Promoted account to administrator"
    );
    Ok(BootstrapOutcome::Promoted)
}

fn validate(email: &str, input: &AdminBootstrap) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "email".to_string(),
        });
    }
    if !email.contains('@') {
        return Err(ValidationError::InvalidValue {
            field: "email".to_string(),
            reason: "must be an email address".to_string(),
        });
    }
    if input.password.len() < MIN_PASSWORD_LEN {
        return Err(ValidationError::InvalidValue {
            field: "password".to_string(),
            reason: format!("must be at least {} characters", MIN_PASSWORD_LEN),
        });
    }
    Ok(())
}

fn display_name_or_email(input: &AdminBootstrap, email: &str) -> String {
    let name = input.display_name.trim();
    if name.is_empty() {
        email.to_string()
    } else {
        name.to_string()
    }
}

/// Hash a password into PHC format with Argon2 defaults.
pub fn hash_password(password: &str) -> Result<String, BootstrapError> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| BootstrapError::Hash(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| BootstrapError::Hash(e.to_string()))?;
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| BootstrapError::Hash(e.to_string()))?
        .to_string();
    Ok(phc)
}

/// Check a password against a PHC hash. Malformed hashes never verify.
pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
