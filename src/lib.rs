//! # Skillforge API Client
//!
//! Rust client for the Skillforge platform API (courses, jobs, uploads,
//! payments).
//!
//! ## Features
//!
//! - Bearer credential management with persistence and server-driven rotation
//! - TTL response caching for GET-shaped reads
//! - Fixed-window rate limiting per endpoint
//! - Retry with exponential backoff behind an injectable clock
//! - Uniform error classification with host-observable side effects
//! - Concurrent batch dispatch with per-item outcomes
//! - Multipart uploads, GraphQL, health probing
//! - Realtime: duplex WebSocket streams and one-way event streams
//! - Injectable storage, transport, and connectivity capabilities for
//!   deterministic tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use skillforge_client::SkillforgeClient;
//! use serde_json::Value;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SkillforgeClient::builder()
//!         .base_url("https://api.skillforge.dev/v1")
//!         .build()?;
//!
//!     client.set_token("token-from-login").await?;
//!
//!     let jobs: Value = client
//!         .get("/jobs", &[("q", "engineer"), ("loc", "remote")])
//!         .await?;
//!     println!("{jobs}");
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - `client` - Composed client facade and builder
//! - `config` - Configuration types and builder
//! - `auth` - Bearer credential store
//! - `cache` - TTL response cache
//! - `resilience` - Rate limiting and retry
//! - `executor` - Single-request execution and classification
//! - `batch` - Concurrent batch dispatch
//! - `transport` - HTTP transport capability and reqwest implementation
//! - `realtime` - WebSocket duplex streams and server-sent events
//! - `events` - Notification/navigation side channel
//! - `storage` - Key-value storage capability
//! - `errors` - Error taxonomy
//! - `observability` - Logging setup
//! - `mocks` - Mock implementations for testing

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod auth;
pub mod batch;
pub mod cache;
pub mod client;
pub mod config;
pub mod errors;
pub mod events;
pub mod executor;
pub mod observability;
pub mod realtime;
pub mod resilience;
pub mod storage;
pub mod transport;

// Development/testing modules
#[cfg(test)]
pub mod mocks;

// Re-exports for convenience
pub use auth::TokenStore;
pub use batch::{BatchDispatcher, BatchItem, BatchOutcome, BatchResult};
pub use cache::ResponseCache;
pub use client::{
    GraphQLError, GraphQLResponse, HealthStatus, SkillforgeClient, SkillforgeClientBuilder,
};
pub use config::{SkillforgeConfig, SkillforgeConfigBuilder};
pub use errors::{SkillforgeError, SkillforgeResult};
pub use events::{ClientEvents, NavigationHint, NoopEvents, Severity, TracingEvents};
pub use executor::{Payload, RequestExecutor, RequestOptions};
pub use observability::{LogFormat, LogLevel, LoggingConfig};
pub use realtime::{DuplexStream, EventStream, ServerEvent, StreamMessage};
pub use resilience::{
    RateLimitConfig, RateLimiter, RetryConfig, RetryPolicy, Sleeper, TokioSleeper,
};
pub use storage::{KeyValueStore, MemoryStore};
pub use transport::{
    AlwaysOnline, Connectivity, FilePart, HttpTransport, MultipartPayload, ReqwestTransport,
};

/// The default Skillforge API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.skillforge.dev/v1";

/// The default per-request timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// The default TTL for cached reads
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// The default retry budget, including the first attempt
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// The default delay before the first retry; later retries double it
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;

/// Requests admitted per endpoint within one rate window
pub const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 10;

/// Length of one rate window
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Bound on the health probe, independent of the request timeout
pub const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 5;
