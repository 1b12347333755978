//! Skillforge API client: the composed request pipeline.
//!
//! Every operation follows the same path: the per-endpoint rate gate first,
//! then the cache (cached reads only), then the executor, wrapped in the
//! retry policy when the call opts in. Side effects surface on the injected
//! [`ClientEvents`] channel, never as return values.

mod graphql;

pub use graphql::{GraphQLError, GraphQLResponse};

use graphql::GraphQLRequest;
use http::header::{HeaderValue, ACCEPT, AUTHORIZATION};
use http::{HeaderMap, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

use crate::auth::{bearer_header, TokenStore};
use crate::batch::{BatchDispatcher, BatchItem, BatchResult};
use crate::cache::ResponseCache;
use crate::config::{SkillforgeConfig, SkillforgeConfigBuilder};
use crate::errors::{SkillforgeError, SkillforgeResult};
use crate::events::{ClientEvents, NoopEvents};
use crate::executor::{resolve_endpoint, Payload, RequestExecutor, RequestOptions};
use crate::realtime::{DuplexStream, EventStream};
use crate::resilience::{RateLimitConfig, RateLimiter, RetryConfig, RetryPolicy, Sleeper};
use crate::storage::{KeyValueStore, MemoryStore};
use crate::transport::{
    AlwaysOnline, Connectivity, FilePart, HttpTransport, MultipartPayload, RequestBody,
    ReqwestTransport,
};
use crate::DEFAULT_HEALTH_TIMEOUT_SECS;

/// Rate-gate label for the batch entry point. Batch items dispatch through
/// the executor directly and are not individually gated.
const BATCH_GATE: &str = "batch";

/// Outcome of a health probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    /// Whether the service answered with a success status
    pub healthy: bool,
    /// The HTTP status the probe received, when it received one
    pub status: Option<u16>,
    /// Time the probe took to settle
    pub latency: Duration,
}

/// Client for the Skillforge platform API.
///
/// Construct one per process (or per distinct backend) via
/// [`SkillforgeClient::builder`] and share it by reference; there is no
/// implicit global instance. All durable state lives in the injected
/// [`KeyValueStore`], so two clients over the same store share credential,
/// cache, and rate windows.
pub struct SkillforgeClient {
    config: SkillforgeConfig,
    base_url: Url,
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<TokenStore>,
    cache: ResponseCache,
    limiter: RateLimiter,
    retry: RetryPolicy,
    executor: Arc<RequestExecutor>,
    dispatcher: BatchDispatcher,
}

impl SkillforgeClient {
    /// Creates a new client builder.
    pub fn builder() -> SkillforgeClientBuilder {
        SkillforgeClientBuilder::new()
    }

    /// Creates a client from configuration, with default capabilities:
    /// in-memory storage, reqwest transport, no-op events, always-online.
    pub fn new(config: SkillforgeConfig) -> SkillforgeResult<Self> {
        config.validate()?;
        Self::assemble(config, None, None, None, None, None)
    }

    /// Creates a client from environment variables.
    pub fn from_env() -> SkillforgeResult<Self> {
        Self::new(SkillforgeConfig::from_env()?)
    }

    /// The configuration this client runs with.
    pub fn config(&self) -> &SkillforgeConfig {
        &self.config
    }

    fn assemble(
        config: SkillforgeConfig,
        store: Option<Arc<dyn KeyValueStore>>,
        transport: Option<Arc<dyn HttpTransport>>,
        events: Option<Arc<dyn ClientEvents>>,
        connectivity: Option<Arc<dyn Connectivity>>,
        sleeper: Option<Arc<dyn Sleeper>>,
    ) -> SkillforgeResult<Self> {
        let base_url = Url::parse(&config.base_url)?;
        let store = store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let transport = match transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(config.timeout)?) as Arc<dyn HttpTransport>,
        };
        let events = events.unwrap_or_else(|| Arc::new(NoopEvents));
        let connectivity = connectivity.unwrap_or_else(|| Arc::new(AlwaysOnline));

        let tokens = Arc::new(TokenStore::new(store.clone()));
        let cache = ResponseCache::new(store.clone(), config.cache_ttl);
        let limiter = RateLimiter::new(store, config.rate_limit.clone());
        let mut retry = RetryPolicy::new(config.retry.clone());
        if let Some(sleeper) = sleeper {
            retry = retry.with_sleeper(sleeper);
        }
        let executor = Arc::new(RequestExecutor::new(
            transport.clone(),
            tokens.clone(),
            events,
            connectivity,
            base_url.clone(),
            config.timeout,
        ));
        let dispatcher = BatchDispatcher::new(executor.clone());

        Ok(Self {
            config,
            base_url,
            transport,
            tokens,
            cache,
            limiter,
            retry,
            executor,
            dispatcher,
        })
    }

    // Token management

    /// Records a credential; subsequent requests carry it as a bearer header.
    pub async fn set_token(&self, token: impl Into<String>) -> SkillforgeResult<()> {
        self.tokens.set(token).await
    }

    /// Drops the credential from memory and from the persistent store.
    pub async fn clear_token(&self) -> SkillforgeResult<()> {
        self.tokens.clear().await
    }

    /// The current credential, if one is set.
    pub async fn token(&self) -> SkillforgeResult<Option<String>> {
        self.tokens.token().await
    }

    // HTTP operations

    /// Performs a request with explicit options and returns the negotiated
    /// payload. The options carry method, headers, query, body, timeout, and
    /// the retry opt-in ([`RequestOptions::with_retry`]).
    pub async fn request(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> SkillforgeResult<Payload> {
        self.dispatch(endpoint, options).await
    }

    /// Performs a GET and deserializes the JSON response.
    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> SkillforgeResult<T> {
        self.dispatch(endpoint, RequestOptions::default().query(query))
            .await?
            .into_typed()
    }

    /// Performs a POST with a JSON body and deserializes the response.
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> SkillforgeResult<T> {
        self.dispatch(endpoint, RequestOptions::new(Method::POST).json(body)?)
            .await?
            .into_typed()
    }

    /// Performs a PUT with a JSON body and deserializes the response.
    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> SkillforgeResult<T> {
        self.dispatch(endpoint, RequestOptions::new(Method::PUT).json(body)?)
            .await?
            .into_typed()
    }

    /// Performs a PATCH with a JSON body and deserializes the response.
    pub async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> SkillforgeResult<T> {
        self.dispatch(endpoint, RequestOptions::new(Method::PATCH).json(body)?)
            .await?
            .into_typed()
    }

    /// Performs a DELETE. Empty response bodies deserialize as `()`.
    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> SkillforgeResult<T> {
        self.dispatch(endpoint, RequestOptions::new(Method::DELETE))
            .await?
            .into_typed()
    }

    /// Uploads one file as a multipart POST under the `file` field.
    ///
    /// The transport assigns the multipart boundary; no content type is set
    /// by the client.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        file: FilePart,
    ) -> SkillforgeResult<T> {
        let options = RequestOptions {
            method: Method::POST,
            body: Some(RequestBody::Multipart(MultipartPayload::single(file))),
            ..RequestOptions::default()
        };
        self.dispatch(endpoint, options).await?.into_typed()
    }

    /// Uploads several files as a multipart POST, named `<field>[<index>]`.
    pub async fn upload_multiple<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        field: &str,
        files: Vec<FilePart>,
    ) -> SkillforgeResult<T> {
        let options = RequestOptions {
            method: Method::POST,
            body: Some(RequestBody::Multipart(MultipartPayload::list(field, files))),
            ..RequestOptions::default()
        };
        self.dispatch(endpoint, options).await?.into_typed()
    }

    /// Executes a GraphQL query or mutation against `/graphql`.
    ///
    /// The typed envelope keeps `data` and `errors` separate; collapse with
    /// [`GraphQLResponse::into_data`] when partial results are not wanted.
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Option<serde_json::Value>,
    ) -> SkillforgeResult<GraphQLResponse<T>> {
        let request = GraphQLRequest {
            query: query.to_string(),
            variables,
        };
        let payload = self
            .dispatch("/graphql", RequestOptions::new(Method::POST).json(&request)?)
            .await?;
        GraphQLResponse::from_payload(payload)
    }

    /// Performs a GET served from the cache when a fresh entry exists.
    ///
    /// On a miss (or an expired entry) the read goes to the transport and the
    /// JSON result is stored under a key derived from the endpoint and its
    /// sorted query parameters, expiring after `ttl` (the configured default
    /// when `None`). The rate gate runs before the cache lookup, so cached
    /// reads still consume window budget.
    pub async fn get_with_cache<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
        ttl: Option<Duration>,
    ) -> SkillforgeResult<T> {
        self.limiter.try_acquire(endpoint).await?;

        let key = ResponseCache::key(endpoint, query);
        if let Some(hit) = self.cache.lookup(&key).await? {
            tracing::debug!(endpoint, "serving cached response");
            return Ok(serde_json::from_value(hit)?);
        }

        let payload = self
            .executor
            .execute(endpoint, RequestOptions::default().query(query))
            .await?;
        if let Payload::Json(value) = payload {
            self.cache.store(&key, value.clone(), ttl).await?;
            Ok(serde_json::from_value(value)?)
        } else {
            // Non-JSON responses are not cacheable; surface the same type
            // mismatch a typed read would.
            payload.into_typed()
        }
    }

    /// Removes every cached response whose key contains the given substring
    /// (empty clears all). Returns the number of entries removed.
    pub async fn clear_cache(&self, filter: &str) -> SkillforgeResult<u32> {
        self.cache.clear(filter).await
    }

    /// Runs a batch of requests concurrently and independently.
    ///
    /// Results mirror input order; one item's failure never aborts siblings.
    /// The batch call itself passes the rate gate under a single label, its
    /// items do not.
    pub async fn batch(&self, items: Vec<BatchItem>) -> SkillforgeResult<Vec<BatchResult>> {
        self.limiter.try_acquire(BATCH_GATE).await?;
        Ok(self.dispatcher.dispatch(items).await)
    }

    /// Fetches an endpoint as raw bytes.
    pub async fn download(&self, endpoint: &str) -> SkillforgeResult<bytes::Bytes> {
        let payload = self.dispatch(endpoint, RequestOptions::default()).await?;
        Ok(match payload {
            Payload::Binary(bytes) => bytes,
            Payload::Text(text) => bytes::Bytes::from(text),
            Payload::Json(serde_json::Value::Null) => bytes::Bytes::new(),
            Payload::Json(value) => bytes::Bytes::from(value.to_string()),
        })
    }

    /// Probes the `/health` endpoint under a short bound.
    ///
    /// Always reports a structured outcome. The probe goes straight to the
    /// transport: an unhealthy backend must not fire user-facing events or
    /// spend retry budget.
    pub async fn health_check(&self) -> HealthStatus {
        let started = Instant::now();
        let bound = Duration::from_secs(DEFAULT_HEALTH_TIMEOUT_SECS);
        let probe = async {
            let url = resolve_endpoint(&self.base_url, "/health", &[])?;
            let mut headers = HeaderMap::new();
            headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
            self.transport.send(Method::GET, url, headers, None).await
        };

        let outcome = tokio::time::timeout(bound, probe).await;
        let latency = started.elapsed();
        match outcome {
            Ok(Ok(response)) => {
                let status = response.status();
                HealthStatus {
                    healthy: status.is_success(),
                    status: Some(status.as_u16()),
                    latency,
                }
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "health probe failed");
                HealthStatus {
                    healthy: false,
                    status: None,
                    latency,
                }
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = bound.as_millis() as u64,
                    "health probe timed out"
                );
                HealthStatus {
                    healthy: false,
                    status: None,
                    latency,
                }
            }
        }
    }

    // Realtime

    /// Opens a duplex WebSocket stream to the given endpoint.
    ///
    /// The endpoint resolves against the base URL with the scheme flipped to
    /// `ws`/`wss`; when a credential is set, the auth hello goes out as the
    /// first frame.
    pub async fn connect_duplex(&self, endpoint: &str) -> SkillforgeResult<DuplexStream> {
        let url = self.websocket_url(endpoint)?;
        let token = self.tokens.token().await?;
        DuplexStream::connect_with_timeout(url.as_str(), token.as_deref(), self.config.timeout)
            .await
    }

    /// Opens a one-way server-sent event stream from the given endpoint.
    ///
    /// The stream fails and closes on any transport error; consumers
    /// reconnect explicitly.
    pub async fn subscribe(&self, endpoint: &str) -> SkillforgeResult<EventStream> {
        let url = resolve_endpoint(&self.base_url, endpoint, &[])?;
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        if let Some(token) = self.tokens.token().await? {
            headers.insert(AUTHORIZATION, bearer_header(&token)?);
        }
        let stream = self
            .transport
            .send_streaming(Method::GET, url, headers)
            .await?;
        Ok(EventStream::new(stream))
    }

    // Internal

    /// Rate gate, then the executor, under the retry policy when requested.
    async fn dispatch(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> SkillforgeResult<Payload> {
        self.limiter.try_acquire(endpoint).await?;

        if options.retry {
            let executor = self.executor.clone();
            let endpoint = endpoint.to_string();
            self.retry
                .run(move || {
                    let executor = executor.clone();
                    let endpoint = endpoint.clone();
                    let options = options.clone();
                    async move { executor.execute(&endpoint, options).await }
                })
                .await
        } else {
            self.executor.execute(endpoint, options).await
        }
    }

    fn websocket_url(&self, endpoint: &str) -> SkillforgeResult<Url> {
        if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
            return Ok(Url::parse(endpoint)?);
        }
        let mut url = resolve_endpoint(&self.base_url, endpoint, &[])?;
        let scheme = match url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| SkillforgeError::Configuration {
                message: format!("Cannot derive a WebSocket URL from {}", url),
            })?;
        Ok(url)
    }
}

/// Builder for [`SkillforgeClient`].
///
/// Configuration fields pass through to [`SkillforgeConfigBuilder`];
/// capability slots default to the production implementations.
pub struct SkillforgeClientBuilder {
    config: SkillforgeConfigBuilder,
    store: Option<Arc<dyn KeyValueStore>>,
    transport: Option<Arc<dyn HttpTransport>>,
    events: Option<Arc<dyn ClientEvents>>,
    connectivity: Option<Arc<dyn Connectivity>>,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl SkillforgeClientBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            config: SkillforgeConfig::builder(),
            store: None,
            transport: None,
            events: None,
            connectivity: None,
            sleeper: None,
        }
    }

    /// Sets the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config = self.config.base_url(base_url);
        self
    }

    /// Sets the default request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.timeout(timeout);
        self
    }

    /// Sets the retry behavior for calls that opt in.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config = self.config.retry(retry);
        self
    }

    /// Sets the per-endpoint rate ceiling.
    pub fn rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.config = self.config.rate_limit(rate_limit);
        self
    }

    /// Sets the default TTL for cached reads.
    pub fn cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.config = self.config.cache_ttl(cache_ttl);
        self
    }

    /// Injects the key-value store backing credential, cache, and windows.
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Injects the HTTP transport.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Injects the side-effect observer.
    pub fn events(mut self, events: Arc<dyn ClientEvents>) -> Self {
        self.events = Some(events);
        self
    }

    /// Injects the connectivity signal.
    pub fn connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    /// Injects the waiting capability used for retry backoff.
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Builds the client.
    pub fn build(self) -> SkillforgeResult<SkillforgeClient> {
        let config = self.config.build()?;
        SkillforgeClient::assemble(
            config,
            self.store,
            self.transport,
            self.events,
            self.connectivity,
            self.sleeper,
        )
    }
}

impl Default for SkillforgeClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MockTransport, RecordingEvents, RecordingSleeper, ScriptedResponse};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct Harness {
        transport: Arc<MockTransport>,
        events: Arc<RecordingEvents>,
        sleeper: Arc<RecordingSleeper>,
        client: SkillforgeClient,
    }

    fn harness() -> Harness {
        harness_configured(|builder| builder)
    }

    fn harness_configured(
        tune: impl FnOnce(SkillforgeClientBuilder) -> SkillforgeClientBuilder,
    ) -> Harness {
        let transport = Arc::new(MockTransport::new());
        let events = Arc::new(RecordingEvents::new());
        let sleeper = Arc::new(RecordingSleeper::new());
        let builder = SkillforgeClient::builder()
            .base_url("https://api.test/v1")
            .transport(transport.clone())
            .events(events.clone())
            .sleeper(sleeper.clone());
        let client = tune(builder).build().unwrap();
        Harness {
            transport,
            events,
            sleeper,
            client,
        }
    }

    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Counts {
        count: u32,
    }

    #[tokio::test]
    async fn test_get_deserializes_typed_response() {
        let h = harness();
        h.transport.expect_response(
            "GET",
            "/v1/jobs",
            ScriptedResponse::json(200, json!({"count": 3})),
        );

        let counts: Counts = h
            .client
            .get("/jobs", &[("q", "engineer"), ("loc", "remote")])
            .await
            .unwrap();

        assert_eq!(counts, Counts { count: 3 });
        assert_eq!(
            h.transport.requests()[0].url.query(),
            Some("q=engineer&loc=remote")
        );
        assert!(h.events.is_empty());
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let h = harness();
        h.transport.expect_response(
            "POST",
            "/v1/jobs",
            ScriptedResponse::json(201, json!({"id": 9})),
        );

        let created: serde_json::Value = h
            .client
            .post("/jobs", &json!({"title": "Backend Engineer"}))
            .await
            .unwrap();

        assert_eq!(created, json!({"id": 9}));
        match &h.transport.requests()[0].body {
            Some(RequestBody::Json(body)) => {
                assert_eq!(body, &json!({"title": "Backend Engineer"}))
            }
            other => panic!("expected a JSON body, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_accepts_empty_body() {
        let h = harness();
        h.transport
            .expect_response("DELETE", "/v1/jobs/9", ScriptedResponse::status(204));

        h.client.delete::<()>("/jobs/9").await.unwrap();
        assert_eq!(h.transport.calls("DELETE", "/v1/jobs/9"), 1);
    }

    #[tokio::test]
    async fn test_get_with_cache_hits_transport_once() {
        let h = harness();
        h.transport.expect_response(
            "GET",
            "/v1/courses",
            ScriptedResponse::json(200, json!({"count": 12})),
        );

        let first: Counts = h
            .client
            .get_with_cache("/courses", &[("level", "intro"), ("lang", "rust")], None)
            .await
            .unwrap();
        // Same parameters in a different order map to the same entry.
        let second: Counts = h
            .client
            .get_with_cache("/courses", &[("lang", "rust"), ("level", "intro")], None)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(h.transport.calls("GET", "/v1/courses"), 1);
    }

    #[tokio::test]
    async fn test_get_with_cache_refetches_after_expiry() {
        let h = harness();
        h.transport.expect_response(
            "GET",
            "/v1/courses",
            ScriptedResponse::json(200, json!({"count": 12})),
        );

        let ttl = Some(Duration::from_millis(20));
        let _: Counts = h.client.get_with_cache("/courses", &[], ttl).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        let _: Counts = h.client.get_with_cache("/courses", &[], ttl).await.unwrap();

        assert_eq!(h.transport.calls("GET", "/v1/courses"), 2);
    }

    #[tokio::test]
    async fn test_rate_gate_denies_before_transport() {
        let h = harness_configured(|builder| {
            builder.rate_limit(RateLimitConfig {
                max_requests: 1,
                window: Duration::from_secs(60),
            })
        });
        h.transport
            .expect_response("GET", "/v1/jobs", ScriptedResponse::json(200, json!([])));

        let _: serde_json::Value = h.client.get("/jobs", &[]).await.unwrap();
        let denied = h.client.get::<serde_json::Value>("/jobs", &[]).await;

        assert!(matches!(
            denied.unwrap_err(),
            SkillforgeError::RateLimited { .. }
        ));
        assert_eq!(h.transport.calls("GET", "/v1/jobs"), 1);
        // Denial produces no side effects.
        assert!(h.events.is_empty());
    }

    #[tokio::test]
    async fn test_cached_read_still_consumes_rate_budget() {
        let h = harness_configured(|builder| {
            builder.rate_limit(RateLimitConfig {
                max_requests: 2,
                window: Duration::from_secs(60),
            })
        });
        h.transport.expect_response(
            "GET",
            "/v1/courses",
            ScriptedResponse::json(200, json!({"count": 12})),
        );

        let _: Counts = h.client.get_with_cache("/courses", &[], None).await.unwrap();
        let _: Counts = h.client.get_with_cache("/courses", &[], None).await.unwrap();
        let denied = h
            .client
            .get_with_cache::<Counts>("/courses", &[], None)
            .await;

        // The gate runs before the cache, so the third read is denied even
        // though it would have been served locally.
        assert!(matches!(
            denied.unwrap_err(),
            SkillforgeError::RateLimited { .. }
        ));
        assert_eq!(h.transport.calls("GET", "/v1/courses"), 1);
    }

    #[tokio::test]
    async fn test_request_with_retry_exhausts_budget() {
        let h = harness_configured(|builder| {
            builder.retry(RetryConfig {
                max_attempts: 3,
                base_delay: Duration::from_millis(1000),
            })
        });
        // Nothing scripted for "/flaky": every attempt fails at the transport.

        let err = h
            .client
            .request("/flaky", RequestOptions::default().with_retry())
            .await
            .unwrap_err();

        match err {
            SkillforgeError::Exhausted { attempts, source } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*source, SkillforgeError::Unreachable { .. }));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert_eq!(h.transport.calls("GET", "/v1/flaky"), 3);
        assert_eq!(
            h.sleeper.recorded(),
            vec![Duration::from_millis(1000), Duration::from_millis(2000)]
        );
    }

    #[tokio::test]
    async fn test_graphql_posts_envelope() {
        let h = harness();
        h.transport.expect_response(
            "POST",
            "/v1/graphql",
            ScriptedResponse::json(200, json!({"data": {"count": 3}})),
        );

        let response = h
            .client
            .graphql::<Counts>(
                "query Jobs($q: String) { jobs(q: $q) { count } }",
                Some(json!({"q": "engineer"})),
            )
            .await
            .unwrap();

        assert_eq!(response.into_data().unwrap(), Counts { count: 3 });
        match &h.transport.requests()[0].body {
            Some(RequestBody::Json(body)) => {
                assert_eq!(body["variables"], json!({"q": "engineer"}));
                assert!(body["query"].as_str().unwrap().starts_with("query Jobs"));
            }
            other => panic!("expected a JSON body, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_upload_uses_file_field() {
        let h = harness();
        h.transport.expect_response(
            "POST",
            "/v1/resumes",
            ScriptedResponse::json(201, json!({"id": 1})),
        );

        let _: serde_json::Value = h
            .client
            .upload(
                "/resumes",
                FilePart::new("resume.pdf", "application/pdf", &b"%PDF-1.4"[..]),
            )
            .await
            .unwrap();

        match &h.transport.requests()[0].body {
            Some(RequestBody::Multipart(payload)) => {
                let names: Vec<&str> =
                    payload.files().iter().map(|(n, _)| n.as_str()).collect();
                assert_eq!(names, vec!["file"]);
            }
            other => panic!("expected a multipart body, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_upload_multiple_indexes_fields() {
        let h = harness();
        h.transport.expect_response(
            "POST",
            "/v1/gallery",
            ScriptedResponse::json(201, json!({"stored": 2})),
        );

        let _: serde_json::Value = h
            .client
            .upload_multiple(
                "/gallery",
                "images",
                vec![
                    FilePart::new("a.png", "image/png", &b"\x89PNG"[..]),
                    FilePart::new("b.png", "image/png", &b"\x89PNG"[..]),
                ],
            )
            .await
            .unwrap();

        match &h.transport.requests()[0].body {
            Some(RequestBody::Multipart(payload)) => {
                let names: Vec<&str> =
                    payload.files().iter().map(|(n, _)| n.as_str()).collect();
                assert_eq!(names, vec!["images[0]", "images[1]"]);
            }
            other => panic!("expected a multipart body, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_batch_gated_once_at_entry() {
        let h = harness_configured(|builder| {
            builder.rate_limit(RateLimitConfig {
                max_requests: 1,
                window: Duration::from_secs(60),
            })
        });
        h.transport
            .expect_response("GET", "/v1/a", ScriptedResponse::json(200, json!(1)));
        h.transport
            .expect_response("GET", "/v1/b", ScriptedResponse::json(200, json!(2)));

        // Two items pass through a ceiling of one: items are not gated.
        let results = h
            .client
            .batch(vec![BatchItem::get("/a"), BatchItem::get("/b")])
            .await
            .unwrap();
        assert!(results.iter().all(|r| r.is_fulfilled()));

        // The entry point itself is.
        let denied = h.client.batch(vec![BatchItem::get("/a")]).await;
        assert!(matches!(
            denied.unwrap_err(),
            SkillforgeError::RateLimited { .. }
        ));
    }

    #[tokio::test]
    async fn test_download_returns_bytes() {
        let h = harness();
        h.transport.expect_response(
            "GET",
            "/v1/badge",
            ScriptedResponse::bytes(200, "image/png", &b"\x89PNG"[..]),
        );

        let bytes = h.client.download("/badge").await.unwrap();
        assert_eq!(bytes.as_ref(), b"\x89PNG");
    }

    #[tokio::test]
    async fn test_health_check_healthy() {
        let h = harness();
        h.transport.expect_response(
            "GET",
            "/v1/health",
            ScriptedResponse::json(200, json!({"status": "ok"})),
        );

        let health = h.client.health_check().await;
        assert!(health.healthy);
        assert_eq!(health.status, Some(200));
    }

    #[tokio::test]
    async fn test_health_check_unhealthy_stays_quiet() {
        let h = harness();
        h.transport
            .expect_response("GET", "/v1/health", ScriptedResponse::status(500));

        let health = h.client.health_check().await;
        assert!(!health.healthy);
        assert_eq!(health.status, Some(500));
        // A failing probe is a result, not a user-facing event.
        assert!(h.events.is_empty());
    }

    #[tokio::test]
    async fn test_health_check_reports_transport_failure() {
        let h = harness();
        // Nothing scripted: the probe cannot reach the service.

        let health = h.client.health_check().await;
        assert!(!health.healthy);
        assert_eq!(health.status, None);
    }

    #[tokio::test]
    async fn test_token_round_trip() {
        let h = harness();
        h.client.set_token("tok-42").await.unwrap();
        assert_eq!(h.client.token().await.unwrap(), Some("tok-42".to_string()));

        h.client.clear_token().await.unwrap();
        assert_eq!(h.client.token().await.unwrap(), None);
    }

    #[test]
    fn test_websocket_url_derivation() {
        let h = harness();
        assert_eq!(
            h.client.websocket_url("/live").unwrap().as_str(),
            "wss://api.test/v1/live"
        );
        assert_eq!(
            h.client
                .websocket_url("wss://stream.test/feed")
                .unwrap()
                .as_str(),
            "wss://stream.test/feed"
        );
    }
}
