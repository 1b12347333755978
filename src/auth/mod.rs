//! Bearer credential management for the Skillforge API.

use http::header::HeaderValue;
use secrecy::{ExposeSecret, SecretString};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::errors::{SkillforgeError, SkillforgeResult};
use crate::storage::{KeyValueStore, TOKEN_KEY};

/// Render a credential as an `Authorization` header value.
pub(crate) fn bearer_header(token: &str) -> SkillforgeResult<HeaderValue> {
    HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
        SkillforgeError::Configuration {
            message: "Credential contains characters not valid in a header".to_string(),
        }
    })
}

/// Holds the bearer credential for the client.
///
/// The credential lives in memory and is mirrored into the injected
/// [`KeyValueStore`] so a fresh client restores it lazily on first use.
/// Writers serialize against readers; the last write wins.
pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
    token: RwLock<Option<SecretString>>,
    restored: AtomicBool,
}

impl TokenStore {
    /// Create a token store backed by the given key-value capability.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            token: RwLock::new(None),
            restored: AtomicBool::new(false),
        }
    }

    /// Record a credential and persist it.
    ///
    /// Every subsequent request carries it as an `Authorization: Bearer`
    /// header until [`TokenStore::clear`] runs or the server rotates it.
    pub async fn set(&self, token: impl Into<String>) -> SkillforgeResult<()> {
        let token = token.into();
        {
            let mut slot = self.token.write().await;
            *slot = Some(SecretString::new(token.clone()));
        }
        self.restored.store(true, Ordering::Release);
        self.store.set(TOKEN_KEY, token).await
    }

    /// Current credential, restoring the persisted copy on first access.
    pub async fn token(&self) -> SkillforgeResult<Option<String>> {
        if !self.restored.load(Ordering::Acquire) {
            let mut slot = self.token.write().await;
            // Re-check under the write lock: a concurrent set/clear may have
            // settled the slot while we waited.
            if !self.restored.load(Ordering::Acquire) {
                *slot = self.store.get(TOKEN_KEY).await?.map(SecretString::new);
                self.restored.store(true, Ordering::Release);
            }
        }
        let slot = self.token.read().await;
        Ok(slot.as_ref().map(|t| t.expose_secret().clone()))
    }

    /// Drop the credential from memory and from the persisted copy.
    pub async fn clear(&self) -> SkillforgeResult<()> {
        {
            let mut slot = self.token.write().await;
            *slot = None;
        }
        self.restored.store(true, Ordering::Release);
        self.store.delete(TOKEN_KEY).await
    }
}
