//! Response caching with TTL over the key-value store.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::SkillforgeResult;
use crate::storage::{KeyValueStore, CACHE_PREFIX};

/// Cached response envelope persisted as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    /// The cached response data.
    data: serde_json::Value,
    /// When this entry was written, epoch milliseconds.
    stored_at: i64,
    /// When this entry stops being served, epoch milliseconds.
    expires_at: i64,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Utc::now().timestamp_millis() >= self.expires_at
    }
}

/// TTL cache for GET-shaped responses.
///
/// Entries live in the injected [`KeyValueStore`] under keys derived from the
/// endpoint and its query parameters, so any two calls for the same logical
/// read share one entry regardless of parameter order.
pub struct ResponseCache {
    store: Arc<dyn KeyValueStore>,
    default_ttl: Duration,
}

impl ResponseCache {
    /// Create a cache over the given store with a default entry TTL.
    pub fn new(store: Arc<dyn KeyValueStore>, default_ttl: Duration) -> Self {
        Self { store, default_ttl }
    }

    /// Derive the storage key for an endpoint and its query parameters.
    ///
    /// Parameters are serialized as a JSON object with keys in sorted order,
    /// so `[("a","1"),("b","2")]` and `[("b","2"),("a","1")]` share a key.
    pub fn key(endpoint: &str, params: &[(&str, &str)]) -> String {
        // A BTreeMap renders its keys in sorted order whatever order the
        // caller passed them in.
        let sorted: BTreeMap<&str, &str> = params.iter().copied().collect();
        let rendered =
            serde_json::to_string(&sorted).unwrap_or_else(|_| "{}".to_string());
        format!("{}{}:{}", CACHE_PREFIX, endpoint, rendered)
    }

    /// Read a fresh entry's data, or nothing.
    ///
    /// Expired entries are deleted on read so the store does not accumulate
    /// dead weight between writes.
    pub async fn lookup(&self, key: &str) -> SkillforgeResult<Option<serde_json::Value>> {
        let raw = match self.store.get(key).await? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            // An unreadable entry is treated as a miss and dropped.
            Err(_) => {
                self.store.delete(key).await?;
                return Ok(None);
            }
        };
        if entry.is_expired() {
            self.store.delete(key).await?;
            return Ok(None);
        }
        Ok(Some(entry.data))
    }

    /// Write an entry, expiring after `ttl` (default TTL when `None`).
    pub async fn store(
        &self,
        key: &str,
        data: serde_json::Value,
        ttl: Option<Duration>,
    ) -> SkillforgeResult<()> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let now = Utc::now().timestamp_millis();
        let entry = CacheEntry {
            data,
            stored_at: now,
            expires_at: now + ttl.as_millis() as i64,
        };
        self.store.set(key, serde_json::to_string(&entry)?).await
    }

    /// Remove every cache entry whose key contains the given substring.
    ///
    /// Only keys in the cache namespace are touched. Returns the number of
    /// entries removed.
    pub async fn clear(&self, filter: &str) -> SkillforgeResult<u32> {
        let mut removed = 0;
        for key in self.store.keys().await? {
            if key.starts_with(CACHE_PREFIX) && key.contains(filter) {
                self.store.delete(&key).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn cache_with_ttl(ttl: Duration) -> (Arc<MemoryStore>, ResponseCache) {
        let store = Arc::new(MemoryStore::new());
        let cache = ResponseCache::new(store.clone(), ttl);
        (store, cache)
    }

    #[test]
    fn test_key_ignores_parameter_order() {
        let a = ResponseCache::key("/jobs", &[("q", "engineer"), ("loc", "remote")]);
        let b = ResponseCache::key("/jobs", &[("loc", "remote"), ("q", "engineer")]);
        assert_eq!(a, b);
        assert_eq!(a, r#"cache_/jobs:{"loc":"remote","q":"engineer"}"#);
    }

    #[test]
    fn test_key_without_parameters() {
        assert_eq!(ResponseCache::key("/courses", &[]), "cache_/courses:{}");
    }

    #[tokio::test]
    async fn test_lookup_before_expiry() {
        let (_, cache) = cache_with_ttl(Duration::from_secs(60));
        let key = ResponseCache::key("/courses", &[]);

        cache.store(&key, json!({"count": 3}), None).await.unwrap();
        let hit = cache.lookup(&key).await.unwrap();
        assert_eq!(hit, Some(json!({"count": 3})));
    }

    #[tokio::test]
    async fn test_expired_entry_removed_on_read() {
        let (store, cache) = cache_with_ttl(Duration::from_millis(20));
        let key = ResponseCache::key("/courses", &[]);

        cache.store(&key, json!([1, 2, 3]), None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(cache.lookup(&key).await.unwrap(), None);
        assert_eq!(store.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_explicit_ttl_overrides_default() {
        let (_, cache) = cache_with_ttl(Duration::from_millis(10));
        let key = ResponseCache::key("/jobs", &[("q", "rust")]);

        cache
            .store(&key, json!({"count": 1}), Some(Duration::from_secs(60)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(cache.lookup(&key).await.unwrap(), Some(json!({"count": 1})));
    }

    #[tokio::test]
    async fn test_clear_by_substring() {
        let (store, cache) = cache_with_ttl(Duration::from_secs(60));
        let jobs = ResponseCache::key("/jobs", &[]);
        let courses = ResponseCache::key("/courses", &[]);

        cache.store(&jobs, json!(1), None).await.unwrap();
        cache.store(&courses, json!(2), None).await.unwrap();
        store
            .set("rate_limit_/jobs", "untouched".to_string())
            .await
            .unwrap();

        let removed = cache.clear("/jobs").await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(cache.lookup(&jobs).await.unwrap(), None);
        assert_eq!(cache.lookup(&courses).await.unwrap(), Some(json!(2)));
        assert!(store.get("rate_limit_/jobs").await.unwrap().is_some());
    }
}
