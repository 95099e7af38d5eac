//! Offline Read Cache
//!
//! The last successfully decoded payload of every read path, persisted in
//! the [`SettingsStore`] under `cache{path}`. Entries are overwritten by
//! newer successes and never evicted. Reads and writes never fail the caller:
//! storage errors are logged and treated as a miss.
//!
//! Stored form:
//!
//! ```text
//! cache/tasks => {"data": [{"id": 1, "title": "X"}], "stored_at": "2024-05-01T10:00:00Z"}
//! ```
//!
//! Entries written before timestamps were recorded hold the bare payload and
//! are read back with an unknown age.

use bridge_traits::{storage::SettingsStore, time::Clock};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const CACHE_PREFIX: &str = "cache";

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StoredEntry {
    data: Value,
    stored_at: DateTime<Utc>,
}

/// A cached payload and when it was stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub data: Value,
    /// `None` for entries without a recorded timestamp
    pub stored_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    fn parse(raw: &str) -> Self {
        let value = match serde_json::from_str::<Value>(raw) {
            Ok(value) => value,
            Err(_) => {
                return Self {
                    data: Value::String(raw.to_string()),
                    stored_at: None,
                }
            }
        };

        match serde_json::from_value::<StoredEntry>(value.clone()) {
            Ok(stored) => Self {
                data: stored.data,
                stored_at: Some(stored.stored_at),
            },
            Err(_) => Self {
                data: value,
                stored_at: None,
            },
        }
    }

    /// Whether the entry is no older than `max_age` at `now`.
    ///
    /// Entries of unknown age are never fresh.
    pub fn is_fresh(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        let Some(stored_at) = self.stored_at else {
            return false;
        };
        match (now - stored_at).to_std() {
            Ok(age) => age <= max_age,
            // Stored "in the future" after a clock change.
            Err(_) => true,
        }
    }
}

#[derive(Clone)]
pub struct OfflineCache {
    settings: Arc<dyn SettingsStore>,
    clock: Arc<dyn Clock>,
}

impl OfflineCache {
    pub fn new(settings: Arc<dyn SettingsStore>, clock: Arc<dyn Clock>) -> Self {
        Self { settings, clock }
    }

    fn key(path: &str) -> String {
        format!("{}{}", CACHE_PREFIX, path)
    }

    /// Store `data` as the latest payload for `path`.
    pub async fn put(&self, path: &str, data: &Value) {
        let entry = StoredEntry {
            data: data.clone(),
            stored_at: self.clock.now(),
        };
        let encoded = match serde_json::to_string(&entry) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(path, error = %e, "Failed to encode cache entry");
                return;
            }
        };

        match self.settings.set_string(&Self::key(path), &encoded).await {
            Ok(()) => debug!(path, "Cached read response"),
            Err(e) => warn!(path, error = %e, "Failed to write cache entry"),
        }
    }

    /// Latest payload for `path`, if any.
    pub async fn get(&self, path: &str) -> Option<Value> {
        self.get_entry(path).await.map(|entry| entry.data)
    }

    pub async fn get_entry(&self, path: &str) -> Option<CacheEntry> {
        match self.settings.get_string(&Self::key(path)).await {
            Ok(raw) => raw.map(|raw| CacheEntry::parse(&raw)),
            Err(e) => {
                warn!(path, error = %e, "Failed to read cache entry");
                None
            }
        }
    }

    /// Payload for `path` only if it was stored within `max_age` of `now`.
    pub async fn get_fresh(
        &self,
        path: &str,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Option<Value> {
        let entry = self.get_entry(path).await?;
        if entry.is_fresh(max_age, now) {
            Some(entry.data)
        } else {
            debug!(path, "Cache entry too old to serve");
            None
        }
    }

    pub async fn remove(&self, path: &str) {
        if let Err(e) = self.settings.delete(&Self::key(path)).await {
            warn!(path, error = %e, "Failed to remove cache entry");
        }
    }

    /// Remove every cache entry, leaving other settings untouched.
    pub async fn clear(&self) {
        let keys = match self.settings.list_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Failed to list cache entries");
                return;
            }
        };

        for key in keys.iter().filter(|k| k.starts_with(CACHE_PREFIX)) {
            if let Err(e) = self.settings.delete(key).await {
                warn!(key = %key, error = %e, "Failed to remove cache entry");
            }
        }
    }

    /// Cached paths in sorted order.
    pub async fn paths(&self) -> Vec<String> {
        let keys = match self.settings.list_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Failed to list cache entries");
                return Vec::new();
            }
        };

        let mut paths: Vec<String> = keys
            .iter()
            .filter_map(|k| k.strip_prefix(CACHE_PREFIX))
            .map(str::to_string)
            .collect();
        paths.sort();
        paths
    }
}
