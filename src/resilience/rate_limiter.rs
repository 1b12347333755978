use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::errors::{SkillforgeError, SkillforgeResult};
use crate::storage::{KeyValueStore, RATE_LIMIT_PREFIX};
use crate::{DEFAULT_RATE_LIMIT_MAX_REQUESTS, DEFAULT_RATE_LIMIT_WINDOW_SECS};

/// Configuration for the fixed-window rate gate
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests admitted per endpoint within one window
    pub max_requests: u32,
    /// Window length
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_RATE_LIMIT_MAX_REQUESTS,
            window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS),
        }
    }
}

/// Window state persisted per endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RateWindow {
    count: u32,
    reset_at: i64,
}

/// Fixed-window rate limiter with one independent window per endpoint.
///
/// Admission is a single check-and-record step under one guard, so two
/// concurrent calls at the ceiling can never both slip through.
pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
    config: RateLimitConfig,
    gate: Mutex<()>,
}

impl RateLimiter {
    /// Create a limiter over the given store.
    pub fn new(store: Arc<dyn KeyValueStore>, config: RateLimitConfig) -> Self {
        Self {
            store,
            config,
            gate: Mutex::new(()),
        }
    }

    /// Admit one request for `endpoint`, or deny it.
    ///
    /// Inside an open window the request count increments; at the ceiling the
    /// call fails with [`SkillforgeError::RateLimited`] carrying the time
    /// until the window resets. Once `reset_at` passes, the next admission
    /// starts a fresh window with a count of one.
    pub async fn try_acquire(&self, endpoint: &str) -> SkillforgeResult<()> {
        let _guard = self.gate.lock().await;

        let key = format!("{}{}", RATE_LIMIT_PREFIX, endpoint);
        let now = Utc::now().timestamp_millis();
        let current = match self.store.get(&key).await? {
            Some(raw) => serde_json::from_str::<RateWindow>(&raw).ok(),
            None => None,
        };

        let next = match current {
            Some(window) if now < window.reset_at => {
                if window.count >= self.config.max_requests {
                    let retry_after = Duration::from_millis((window.reset_at - now) as u64);
                    tracing::warn!(endpoint, retry_after_ms = retry_after.as_millis() as u64, "rate window at ceiling");
                    return Err(SkillforgeError::RateLimited {
                        endpoint: endpoint.to_string(),
                        retry_after,
                    });
                }
                RateWindow {
                    count: window.count + 1,
                    reset_at: window.reset_at,
                }
            }
            _ => RateWindow {
                count: 1,
                reset_at: now + self.config.window.as_millis() as i64,
            },
        };

        self.store.set(&key, serde_json::to_string(&next)?).await
    }
}
