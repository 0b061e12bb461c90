//! Request and response bodies for the content endpoints.

use chrono::Utc;
use marquee_core::{ContentMap, ReadSource, Timestamp};
use marquee_storage::CacheStats;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::gateway::{ContentRead, PushReceipt};

// ============================================================================
// READ
// ============================================================================

/// Body of `GET /api/v1/content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ReadContentResponse {
    pub success: bool,
    /// Section key to payload.
    #[schema(value_type = Object)]
    pub content: ContentMap,
    /// `cache`, `database`, or `unavailable`.
    pub source: ReadSource,
    /// When the served snapshot was taken; response time when unavailable.
    #[schema(value_type = String, format = "date-time")]
    pub timestamp: Timestamp,
}

impl From<&ContentRead> for ReadContentResponse {
    fn from(read: &ContentRead) -> Self {
        Self {
            success: read.is_available(),
            content: read.content(),
            source: read.source,
            timestamp: read
                .snapshot
                .as_ref()
                .map(|s| s.taken_at())
                .unwrap_or_else(Utc::now),
        }
    }
}

/// Body of `GET /api/v1/content/{key}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SectionResponse {
    pub success: bool,
    pub key: String,
    #[schema(value_type = Object)]
    pub payload: Value,
    pub source: ReadSource,
    #[schema(value_type = String, format = "date-time")]
    pub timestamp: Timestamp,
}

// ============================================================================
// PUSH
// ============================================================================

/// Body of `POST /api/v1/content/push`. Documentation only: the handler
/// validates the raw JSON so malformed bodies get field-level errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PushContentRequest {
    /// Full replacement content, section key to payload. Must not be empty.
    #[schema(value_type = Object)]
    pub content: ContentMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PushContentResponse {
    pub success: bool,
    pub message: String,
    #[schema(value_type = String, format = "date-time")]
    pub timestamp: Timestamp,
}

impl From<&PushReceipt> for PushContentResponse {
    fn from(receipt: &PushReceipt) -> Self {
        Self {
            success: true,
            message: format!("Content cache updated with {} sections", receipt.section_count()),
            timestamp: receipt.snapshot.taken_at(),
        }
    }
}

// ============================================================================
// CACHE ADMINISTRATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ResetCacheResponse {
    pub success: bool,
    pub message: String,
    #[schema(value_type = String, format = "date-time")]
    pub timestamp: Timestamp,
}

/// Body of `GET /api/v1/content/stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CacheStatsResponse {
    pub populated: bool,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub hydrations: u64,
    pub hydrate_failures: u64,
    pub replacements: u64,
    pub resets: u64,
    pub section_count: u64,
}

impl CacheStatsResponse {
    pub fn new(stats: &CacheStats, populated: bool) -> Self {
        Self {
            populated,
            hits: stats.hits,
            misses: stats.misses,
            hit_rate: stats.hit_rate(),
            hydrations: stats.hydrations,
            hydrate_failures: stats.hydrate_failures,
            replacements: stats.replacements,
            resets: stats.resets,
            section_count: stats.section_count,
        }
    }
}
