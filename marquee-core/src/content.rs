//! Content sections and immutable snapshots

use crate::Timestamp;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Section key to payload mapping, the unit of a push.
pub type ContentMap = HashMap<String, Value>;

/// A named, independently editable region of site content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ContentSection {
    pub key: String,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub payload: Value,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub last_updated: Timestamp,
    /// Principal that last wrote the section.
    pub updated_by: String,
}

impl ContentSection {
    pub fn new(key: impl Into<String>, payload: Value, updated_by: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            payload,
            last_updated: Utc::now(),
            updated_by: updated_by.into(),
        }
    }
}

/// Where a snapshot's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    /// Installed by a push.
    Cache,
    /// Installed by a hydrate from the persistent store.
    Database,
}

/// Source tag reported to readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ReadSource {
    Cache,
    Database,
    Unavailable,
}

impl ReadSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ReadSource::Cache => "cache",
            ReadSource::Database => "database",
            ReadSource::Unavailable => "unavailable",
        }
    }
}

impl From<SnapshotSource> for ReadSource {
    fn from(source: SnapshotSource) -> Self {
        match source {
            SnapshotSource::Cache => ReadSource::Cache,
            SnapshotSource::Database => ReadSource::Database,
        }
    }
}

/// Complete in-memory copy of all sections at one point in time.
///
/// Fields are private: once built, a snapshot is never mutated, only
/// superseded by a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    sections: ContentMap,
    source: SnapshotSource,
    taken_at: Timestamp,
}

impl Snapshot {
    pub fn new(sections: ContentMap, source: SnapshotSource) -> Self {
        Self {
            sections,
            source,
            taken_at: Utc::now(),
        }
    }

    /// Build a database-tagged snapshot from stored sections.
    /// A duplicated key keeps the most recently updated payload.
    pub fn from_sections(sections: Vec<ContentSection>) -> Self {
        let mut latest: HashMap<String, (Timestamp, Value)> = HashMap::with_capacity(sections.len());
        for section in sections {
            match latest.get(&section.key) {
                Some((seen, _)) if *seen > section.last_updated => {}
                _ => {
                    latest.insert(section.key, (section.last_updated, section.payload));
                }
            }
        }
        let map = latest
            .into_iter()
            .map(|(key, (_, payload))| (key, payload))
            .collect();
        Self::new(map, SnapshotSource::Database)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.sections.get(key)
    }

    pub fn sections(&self) -> &ContentMap {
        &self.sections
    }

    pub fn source(&self) -> SnapshotSource {
        self.source
    }

    pub fn taken_at(&self) -> Timestamp {
        self.taken_at
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}
