//! Database Connection Pool Module
//!
//! PostgreSQL persistence for content sections and back-office accounts,
//! pooled with deadpool-postgres. [`DbClient`] implements the store traits
//! the content cache and the admin bootstrap are written against.

use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use marquee_core::{Account, ContentSection, Role, StoreError};
use marquee_storage::{AccountStore, ContentStore};
use std::time::Duration;
use tokio_postgres::{NoTls, Row};

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub max_size: usize,
    /// Wait for a pooled connection.
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "marquee".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("MARQUEE_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("MARQUEE_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("MARQUEE_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("MARQUEE_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("MARQUEE_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("MARQUEE_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            timeout: std::env::var("MARQUEE_DB_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = deadpool_postgres::PoolConfig::new(self.max_size);
        pool_cfg.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_cfg);

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS content_sections (
    key           TEXT PRIMARY KEY,
    payload       JSONB NOT NULL,
    last_updated  TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_by    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS accounts (
    account_id     UUID PRIMARY KEY,
    email          TEXT NOT NULL UNIQUE,
    display_name   TEXT NOT NULL,
    role           TEXT NOT NULL,
    password_hash  TEXT NOT NULL,
    created_at     TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at     TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

// ============================================================================
// DATABASE CLIENT
// ============================================================================

#[derive(Clone)]
pub struct DbClient {
    pool: Pool,
}

impl DbClient {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn get_conn(&self) -> ApiResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(ApiError::from)
    }

    async fn store_conn(&self) -> Result<deadpool_postgres::Object, StoreError> {
        self.pool.get().await.map_err(|e| StoreError::Unavailable {
            reason: e.to_string(),
        })
    }

    /// Create the tables if they do not exist. Safe to run on every start.
    pub async fn ensure_schema(&self) -> ApiResult<()> {
        let conn = self.get_conn().await?;
        conn.batch_execute(SCHEMA).await?;
        tracing::info!("Database schema ensured");
        Ok(())
    }
}

fn query_failed(operation: &str, err: tokio_postgres::Error) -> StoreError {
    tracing::error!(operation, error = ?err, "Store query failed");
    StoreError::QueryFailed {
        operation: operation.to_string(),
        reason: err.to_string(),
    }
}

fn malformed(err: impl std::fmt::Display) -> StoreError {
    StoreError::MalformedRecord {
        reason: err.to_string(),
    }
}

fn section_from_row(row: &Row) -> Result<ContentSection, StoreError> {
    Ok(ContentSection {
        key: row.try_get("key").map_err(malformed)?,
        payload: row.try_get("payload").map_err(malformed)?,
        last_updated: row.try_get("last_updated").map_err(malformed)?,
        updated_by: row.try_get("updated_by").map_err(malformed)?,
    })
}

fn account_from_row(row: &Row) -> Result<Account, StoreError> {
    let role: String = row.try_get("role").map_err(malformed)?;
    Ok(Account {
        account_id: row.try_get("account_id").map_err(malformed)?,
        email: row.try_get("email").map_err(malformed)?,
        display_name: row.try_get("display_name").map_err(malformed)?,
        role: role.parse::<Role>().map_err(malformed)?,
        password_hash: row.try_get("password_hash").map_err(malformed)?,
        created_at: row.try_get("created_at").map_err(malformed)?,
        updated_at: row.try_get("updated_at").map_err(malformed)?,
    })
}

#[async_trait]
impl ContentStore for DbClient {
    async fn fetch_all_sections(&self) -> Result<Vec<ContentSection>, StoreError> {
        let conn = self.store_conn().await?;
        let rows = conn
            .query(
                "SELECT key, payload, last_updated, updated_by FROM content_sections ORDER BY last_updated",
                &[],
            )
            .await
            .map_err(|e| query_failed("fetch_all_sections", e))?;

        rows.iter().map(section_from_row).collect()
    }

    async fn upsert_section(&self, section: &ContentSection) -> Result<(), StoreError> {
        let conn = self.store_conn().await?;
        conn.execute(
            "INSERT INTO content_sections (key, payload, last_updated, updated_by)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (key) DO UPDATE
             SET payload = EXCLUDED.payload,
                 last_updated = EXCLUDED.last_updated,
                 updated_by = EXCLUDED.updated_by",
            &[
                &section.key,
                &section.payload,
                &section.last_updated,
                &section.updated_by,
            ],
        )
        .await
        .map_err(|e| query_failed("upsert_section", e))?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let conn = self.store_conn().await?;
        conn.query_one("SELECT 1", &[])
            .await
            .map_err(|e| query_failed("ping", e))?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for DbClient {
    async fn account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let conn = self.store_conn().await?;
        let row = conn
            .query_opt(
                "SELECT account_id, email, display_name, role, password_hash, created_at, updated_at
                 FROM accounts WHERE email = $1",
                &[&email],
            )
            .await
            .map_err(|e| query_failed("account_by_email", e))?;

        row.as_ref().map(account_from_row).transpose()
    }

    async fn upsert_account(&self, account: &Account) -> Result<Account, StoreError> {
        let conn = self.store_conn().await?;
        // Identity and creation time survive an upsert.
        let row = conn
            .query_one(
                "INSERT INTO accounts
                     (account_id, email, display_name, role, password_hash, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (email) DO UPDATE
                 SET display_name = EXCLUDED.display_name,
                     role = EXCLUDED.role,
                     password_hash = EXCLUDED.password_hash,
                     updated_at = now()
                 RETURNING account_id, email, display_name, role, password_hash, created_at, updated_at",
                &[
                    &account.account_id,
                    &account.email,
                    &account.display_name,
                    &account.role.as_str(),
                    &account.password_hash,
                    &account.created_at,
                    &account.updated_at,
                ],
            )
            .await
            .map_err(|e| query_failed("upsert_account", e))?;

        account_from_row(&row)
    }
}
