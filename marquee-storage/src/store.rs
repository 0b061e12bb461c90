//! Persistent store collaborators.
//!
//! The cache only ever needs to read every section at once. Section writes
//! and account upserts belong to the admin workflow and the bootstrap tool.

use async_trait::async_trait;
use chrono::Utc;
use marquee_core::{Account, ContentSection, StoreError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Source of truth for site content.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Read every stored section.
    async fn fetch_all_sections(&self) -> Result<Vec<ContentSection>, StoreError>;

    /// Insert or replace one section by key.
    async fn upsert_section(&self, section: &ContentSection) -> Result<(), StoreError>;

    /// Connectivity check for readiness probes. The default reads every
    /// section; stores with a cheaper round trip override it.
    async fn ping(&self) -> Result<(), StoreError> {
        self.fetch_all_sections().await.map(|_| ())
    }
}

/// Back-office accounts, keyed by unique email.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    /// Insert or update by email. Returns the stored account.
    async fn upsert_account(&self, account: &Account) -> Result<Account, StoreError>;
}

#[async_trait]
impl<T: ContentStore + ?Sized> ContentStore for Arc<T> {
    async fn fetch_all_sections(&self) -> Result<Vec<ContentSection>, StoreError> {
        (**self).fetch_all_sections().await
    }

    async fn upsert_section(&self, section: &ContentSection) -> Result<(), StoreError> {
        (**self).upsert_section(section).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        (**self).ping().await
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// In-memory content and account store for development and tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryContentStore {
    sections: Arc<RwLock<HashMap<String, ContentSection>>>,
    accounts: Arc<RwLock<HashMap<String, Account>>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with sections written by `updated_by`.
    pub fn with_sections<I, K>(sections: I, updated_by: &str) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let map = sections
            .into_iter()
            .map(|(key, payload)| {
                let section = ContentSection::new(key, payload, updated_by);
                (section.key.clone(), section)
            })
            .collect();
        Self {
            sections: Arc::new(RwLock::new(map)),
            accounts: Arc::default(),
        }
    }

    pub fn section_count(&self) -> usize {
        self.sections.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn account_count(&self) -> usize {
        self.accounts.read().map(|a| a.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn fetch_all_sections(&self) -> Result<Vec<ContentSection>, StoreError> {
        let sections = self.sections.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(sections.values().cloned().collect())
    }

    async fn upsert_section(&self, section: &ContentSection) -> Result<(), StoreError> {
        let mut sections = self.sections.write().map_err(|_| StoreError::LockPoisoned)?;
        sections.insert(section.key.clone(), section.clone());
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.sections
            .read()
            .map(|_| ())
            .map_err(|_| StoreError::LockPoisoned)
    }
}

#[async_trait]
impl AccountStore for InMemoryContentStore {
    async fn account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(accounts.get(email).cloned())
    }

    async fn upsert_account(&self, account: &Account) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.write().map_err(|_| StoreError::LockPoisoned)?;
        let stored = match accounts.get(&account.email) {
            // Identity and creation time survive an upsert.
            Some(existing) => Account {
                account_id: existing.account_id,
                created_at: existing.created_at,
                updated_at: Utc::now(),
                ..account.clone()
            },
            None => account.clone(),
        };
        accounts.insert(stored.email.clone(), stored.clone());
        Ok(stored)
    }
}
