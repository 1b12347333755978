//! Key-Value Storage
//!
//! All durable client state (credential, cache entries, rate windows) goes
//! through this capability so hosts decide where it actually lives.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::errors::SkillforgeResult;

/// Storage key for the persisted bearer credential.
pub const TOKEN_KEY: &str = "auth_token";
/// Key prefix for cached responses.
pub const CACHE_PREFIX: &str = "cache_";
/// Key prefix for rate-limit windows.
pub const RATE_LIMIT_PREFIX: &str = "rate_limit_";

/// Key-value storage interface backing the client pipeline.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value for a key.
    async fn get(&self, key: &str) -> SkillforgeResult<Option<String>>;

    /// Write a value for a key, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> SkillforgeResult<()>;

    /// Delete a key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> SkillforgeResult<()>;

    /// List all stored keys.
    async fn keys(&self) -> SkillforgeResult<Vec<String>>;
}

/// In-memory store. Default backing for clients that do not inject one,
/// and the deterministic choice for tests.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> SkillforgeResult<Option<String>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> SkillforgeResult<()> {
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> SkillforgeResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn keys(&self) -> SkillforgeResult<Vec<String>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.keys().cloned().collect())
    }
}
