use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use tracing::trace;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// In-process key/value cache with a per-entry time to live.
///
/// Values are stored as JSON so differently typed results can share one map.
/// Expired entries are dropped lazily on read.
#[derive(Debug, Clone, Default)]
pub struct Cache {
    entries: Arc<DashMap<String, CacheEntry>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let now = Instant::now();

        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }

        // Guard on expiry so a concurrent fresh write is kept
        if self
            .entries
            .remove_if(key, |_, entry| entry.expires_at <= now)
            .is_some()
        {
            trace!("Cache entry '{}' expired", key);
        }
        None
    }

    pub fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Typed read; entries that no longer deserialize count as misses.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    pub fn set_as<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        if let Ok(value) = serde_json::to_value(value) {
            self.set(key, value, ttl);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_set_then_get() {
        let cache = Cache::new();
        cache.set("stats:7", json!({"sent": 3}), Duration::from_secs(60));

        assert_eq!(cache.get("stats:7"), Some(json!({"sent": 3})));
        assert_eq!(cache.get("stats:30"), None);
    }

    #[test]
    fn test_expired_entries_are_dropped() {
        let cache = Cache::new();
        cache.set("probe", json!(true), Duration::ZERO);

        assert_eq!(cache.get("probe"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_delete() {
        let cache = Cache::new();
        cache.set("probe", json!(1), Duration::from_secs(60));

        assert!(cache.delete("probe"));
        assert!(!cache.delete("probe"));
    }

    #[test]
    fn test_typed_access() {
        let cache = Cache::new();
        cache.set_as("days", &vec![1_u32, 2, 3], Duration::from_secs(60));

        assert_eq!(cache.get_as::<Vec<u32>>("days"), Some(vec![1, 2, 3]));
        assert_eq!(cache.get_as::<String>("days"), None);
    }
}
