//! Cache manifest: escaped key -> (expiry, blob file name)
//!
//! Stored as one JSON object:
//!
//! ```json
//! { "http%3A%2F%2Fx": { "expiredTime": 1718000000000, "value": "3f2a..." } }
//! ```
//!
//! Loading is lenient: entries with a missing or malformed `expiredTime` or
//! `value` are dropped instead of failing the whole file.

use crate::error::StashResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

/// One cached key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Expiry in milliseconds since the Unix epoch
    #[serde(rename = "expiredTime")]
    pub expired_time: i64,

    /// Blob file name, stable for the life of the key
    pub value: String,
}

impl CacheEntry {
    pub fn new(blob: impl Into<String>, expired_time: i64) -> Self {
        Self {
            expired_time,
            value: blob.into(),
        }
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.expired_time
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.expired_time)
    }
}

/// All cache entries, keyed by escaped cache key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeMap<String, CacheEntry>,
}

impl Manifest {
    /// Parse manifest text, dropping malformed entries
    pub fn parse(text: &str) -> Self {
        let root = match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(root)) => root,
            Ok(_) => {
                warn!("Cache manifest is not a JSON object, starting empty");
                return Self::default();
            }
            Err(e) => {
                warn!("Cache manifest is unreadable, starting empty: {}", e);
                return Self::default();
            }
        };

        let mut entries = BTreeMap::new();
        for (key, raw) in root {
            let expired_time = raw.get("expiredTime").and_then(Value::as_i64);
            let blob = raw
                .get("value")
                .and_then(Value::as_str)
                .filter(|name| is_valid_blob_name(name));
            match (expired_time, blob) {
                (Some(expired_time), Some(blob)) => {
                    entries.insert(key, CacheEntry::new(blob, expired_time));
                }
                _ => debug!("Dropping malformed manifest entry {}", key),
            }
        }
        Self { entries }
    }

    /// Read the manifest file; a missing file is an empty manifest
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(e) if e.kind() == ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!("Failed to read cache manifest {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn render(&self) -> StashResult<String> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, entry: CacheEntry) -> Option<CacheEntry> {
        self.entries.insert(key, entry)
    }

    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        self.entries.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CacheEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any entry points at `blob`
    pub fn references(&self, blob: &str) -> bool {
        self.entries.values().any(|entry| entry.value == blob)
    }

    /// Remove and return every entry expired at `now_ms`
    pub fn drain_expired(&mut self, now_ms: i64) -> Vec<(String, CacheEntry)> {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now_ms))
            .map(|(key, _)| key.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|key| self.entries.remove(&key).map(|entry| (key, entry)))
            .collect()
    }

    /// Remove and return every entry
    pub fn drain(&mut self) -> Vec<(String, CacheEntry)> {
        std::mem::take(&mut self.entries).into_iter().collect()
    }
}

/// Blob names must stay inside the blob directory
fn is_valid_blob_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}
