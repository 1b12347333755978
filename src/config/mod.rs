//! Configuration types for the Skillforge API client.

use std::time::Duration;
use url::Url;

use crate::errors::{SkillforgeError, SkillforgeResult};
use crate::resilience::{RateLimitConfig, RetryConfig};
use crate::{DEFAULT_BASE_URL, DEFAULT_CACHE_TTL_SECS, DEFAULT_TIMEOUT_SECS};

/// Configuration for the Skillforge API client.
#[derive(Debug, Clone)]
pub struct SkillforgeConfig {
    /// Base URL requests resolve against
    pub base_url: String,
    /// Default per-request timeout
    pub timeout: Duration,
    /// Retry behavior for calls that opt in
    pub retry: RetryConfig,
    /// Per-endpoint dispatch ceiling
    pub rate_limit: RateLimitConfig,
    /// Default TTL for cached reads
    pub cache_ttl: Duration,
}

impl SkillforgeConfig {
    /// Creates a new configuration builder
    pub fn builder() -> SkillforgeConfigBuilder {
        SkillforgeConfigBuilder::default()
    }

    /// Creates a configuration from environment variables
    pub fn from_env() -> SkillforgeResult<Self> {
        let base_url =
            std::env::var("SKILLFORGE_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("SKILLFORGE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let cache_ttl_secs = std::env::var("SKILLFORGE_CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CACHE_TTL_SECS);

        let config = Self {
            base_url,
            timeout: Duration::from_secs(timeout_secs),
            retry: RetryConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cache_ttl: Duration::from_secs(cache_ttl_secs),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that the configuration can actually drive a client.
    pub fn validate(&self) -> SkillforgeResult<()> {
        Url::parse(&self.base_url).map_err(|e| SkillforgeError::Configuration {
            message: format!("Invalid base URL '{}': {}", self.base_url, e),
        })?;
        if self.timeout.is_zero() {
            return Err(SkillforgeError::Configuration {
                message: "Timeout must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for SkillforgeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }
}

/// Builder for SkillforgeConfig
#[derive(Default)]
pub struct SkillforgeConfigBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    retry: Option<RetryConfig>,
    rate_limit: Option<RateLimitConfig>,
    cache_ttl: Option<Duration>,
}

impl SkillforgeConfigBuilder {
    /// Sets the base URL
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the default request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the retry behavior
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Sets the rate limit
    pub fn rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    /// Sets the default cache TTL
    pub fn cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = Some(cache_ttl);
        self
    }

    /// Builds the configuration
    pub fn build(self) -> SkillforgeResult<SkillforgeConfig> {
        let config = SkillforgeConfig {
            base_url: self.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            retry: self.retry.unwrap_or_default(),
            rate_limit: self.rate_limit.unwrap_or_default(),
            cache_ttl: self
                .cache_ttl
                .unwrap_or(Duration::from_secs(DEFAULT_CACHE_TTL_SECS)),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = SkillforgeConfig::builder().build().unwrap();

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.rate_limit.max_requests, 10);
        assert_eq!(config.cache_ttl, Duration::from_secs(DEFAULT_CACHE_TTL_SECS));
    }

    #[test]
    fn test_builder_custom_values() {
        let config = SkillforgeConfig::builder()
            .base_url("https://staging.skillforge.dev/v2")
            .timeout(Duration::from_secs(10))
            .rate_limit(RateLimitConfig {
                max_requests: 2,
                window: Duration::from_secs(5),
            })
            .build()
            .unwrap();

        assert_eq!(config.base_url, "https://staging.skillforge.dev/v2");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.rate_limit.max_requests, 2);
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = SkillforgeConfig::builder().base_url("not a url").build();
        assert!(matches!(
            result,
            Err(SkillforgeError::Configuration { .. })
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = SkillforgeConfig::builder()
            .timeout(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }
}
