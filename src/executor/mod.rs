//! Request execution: URL resolution, header assembly, response handling.
//!
//! One request goes through here as classify-then-react: a non-success
//! response is first turned into an error by pure inspection of status and
//! body, then exactly one side effect fires on the events channel, then the
//! error surfaces. Transport failures never reach the reaction table.

use bytes::Bytes;
use http::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

use crate::auth::TokenStore;
use crate::errors::{SkillforgeError, SkillforgeResult};
use crate::events::{ClientEvents, NavigationHint, Severity};
use crate::transport::{Connectivity, HttpTransport, RequestBody};

/// Response header carrying a rotated credential.
const NEW_TOKEN_HEADER: &str = "x-new-token";

/// Join an endpoint to the base URL unless it is already absolute, then
/// append query parameters.
pub(crate) fn resolve_endpoint(
    base_url: &Url,
    endpoint: &str,
    query: &[(String, String)],
) -> SkillforgeResult<Url> {
    let mut url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Url::parse(endpoint)?
    } else {
        let base = base_url.as_str().trim_end_matches('/');
        let path = endpoint.trim_start_matches('/');
        Url::parse(&format!("{}/{}", base, path))?
    };
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in query {
            pairs.append_pair(name, value);
        }
    }
    Ok(url)
}

/// Response payload, negotiated from the response content type.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// `application/json` body, parsed
    Json(serde_json::Value),
    /// `text/*` body, decoded as UTF-8
    Text(String),
    /// Anything else, raw bytes
    Binary(Bytes),
}

impl Payload {
    /// JSON view of the payload, when it is one.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Deserialize a JSON payload into a typed value.
    pub fn into_typed<T: DeserializeOwned>(self) -> SkillforgeResult<T> {
        match self {
            Payload::Json(value) => Ok(serde_json::from_value(value)?),
            Payload::Text(_) => Err(SkillforgeError::Serialization {
                message: "Expected a JSON response, got text".to_string(),
            }),
            Payload::Binary(_) => Err(SkillforgeError::Serialization {
                message: "Expected a JSON response, got binary data".to_string(),
            }),
        }
    }
}

/// Per-call options for [`RequestExecutor::execute`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// HTTP method; GET when unset
    pub method: Method,
    /// Extra headers; on conflict these win over the defaults
    pub headers: HeaderMap,
    /// Query parameters appended to the URL
    pub query: Vec<(String, String)>,
    /// Request body
    pub body: Option<RequestBody>,
    /// Per-call timeout override
    pub timeout: Option<Duration>,
    /// Run the call under the retry policy
    pub retry: bool,
}

impl RequestOptions {
    /// Options for the given method, everything else default.
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    /// Attach a JSON body.
    pub fn json<B: Serialize>(mut self, body: &B) -> SkillforgeResult<Self> {
        self.body = Some(RequestBody::Json(serde_json::to_value(body)?));
        Ok(self)
    }

    /// Append query parameters.
    pub fn query(mut self, pairs: &[(&str, &str)]) -> Self {
        self.query.extend(
            pairs
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string())),
        );
        self
    }

    /// Set a header, overriding any default of the same name.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Bound this call to the given timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Opt this call into the retry policy.
    pub fn with_retry(mut self) -> Self {
        self.retry = true;
        self
    }
}

/// Executes single requests against the transport.
pub struct RequestExecutor {
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<TokenStore>,
    events: Arc<dyn ClientEvents>,
    connectivity: Arc<dyn Connectivity>,
    base_url: Url,
    default_timeout: Duration,
}

impl RequestExecutor {
    /// Wire an executor from its capabilities.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        tokens: Arc<TokenStore>,
        events: Arc<dyn ClientEvents>,
        connectivity: Arc<dyn Connectivity>,
        base_url: Url,
        default_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            tokens,
            events,
            connectivity,
            base_url,
            default_timeout,
        }
    }

    /// Execute one request and negotiate its payload.
    pub async fn execute(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> SkillforgeResult<Payload> {
        let RequestOptions {
            method,
            headers: call_headers,
            query,
            body,
            timeout,
            ..
        } = options;

        let url = resolve_endpoint(&self.base_url, endpoint, &query)?;
        let multipart = matches!(body, Some(RequestBody::Multipart(_)));
        let headers = self.assemble_headers(call_headers, multipart).await?;
        let timeout = timeout.unwrap_or(self.default_timeout);

        let started = Instant::now();
        let send = self.transport.send(method.clone(), url, headers, body);
        let response = match tokio::time::timeout(timeout, send).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                tracing::warn!(method = %method, path = endpoint, error = %err, "transport failure");
                return Err(self.mark_connectivity(err));
            }
            Err(_) => {
                let err = SkillforgeError::Unreachable {
                    message: format!("Request timed out after {}ms", timeout.as_millis()),
                };
                tracing::warn!(method = %method, path = endpoint, error = %err, "transport failure");
                return Err(self.mark_connectivity(err));
            }
        };

        // Server-driven credential rotation comes first, on any status.
        if let Some(rotated) = response
            .headers()
            .get(NEW_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            self.tokens.set(rotated).await?;
        }

        let status = response.status();
        tracing::debug!(
            method = %method,
            path = endpoint,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request completed"
        );

        if status.is_success() {
            return Self::negotiate_payload(response);
        }

        let error = SkillforgeError::from_response(status.as_u16(), response.body());
        self.react(&error, endpoint).await;
        Err(error)
    }

    /// Default headers with per-call overrides applied on top.
    ///
    /// Multipart bodies get no default content type: the transport sets the
    /// one carrying its boundary.
    async fn assemble_headers(
        &self,
        call_headers: HeaderMap,
        multipart: bool,
    ) -> SkillforgeResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        if !multipart {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = self.tokens.token().await? {
            headers.insert(AUTHORIZATION, crate::auth::bearer_header(&token)?);
        }

        for (name, value) in call_headers.iter() {
            headers.insert(name.clone(), value.clone());
        }
        Ok(headers)
    }

    /// Turn the response body into a payload based on its content type.
    fn negotiate_payload(response: Response<Bytes>) -> SkillforgeResult<Payload> {
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response.into_body();

        if body.is_empty() {
            return Ok(Payload::Json(serde_json::Value::Null));
        }

        match content_type.parse::<mime::Mime>() {
            Ok(m)
                if (m.type_() == mime::APPLICATION && m.subtype() == mime::JSON)
                    || m.suffix() == Some(mime::JSON) =>
            {
                Ok(Payload::Json(serde_json::from_slice(&body)?))
            }
            Ok(m) if m.type_() == mime::TEXT => {
                let text = String::from_utf8(body.to_vec()).map_err(|e| {
                    SkillforgeError::Serialization {
                        message: format!("Response is not valid UTF-8: {}", e),
                    }
                })?;
                Ok(Payload::Text(text))
            }
            _ => Ok(Payload::Binary(body)),
        }
    }

    /// Fire the one side effect a failed status calls for.
    ///
    /// A failed credential wipe is logged, not surfaced: the classified
    /// error stays the caller's answer.
    async fn react(&self, error: &SkillforgeError, endpoint: &str) {
        let (status, message) = match error {
            SkillforgeError::Http {
                status, message, ..
            } => (*status, message.as_str()),
            _ => return,
        };

        match status {
            401 => {
                if let Err(err) = self.tokens.clear().await {
                    tracing::warn!(error = %err, "failed to clear credential after 401");
                }
                self.events
                    .navigate(NavigationHint::Login, Some(endpoint))
                    .await;
            }
            403 => self.events.notify(message, Severity::Error).await,
            404 => self.events.navigate(NavigationHint::NotFound, None).await,
            429 => self.events.notify(message, Severity::Warning).await,
            status if status >= 500 => self.events.notify(message, Severity::Error).await,
            _ => {}
        }
    }

    fn mark_connectivity(&self, err: SkillforgeError) -> SkillforgeError {
        if !self.connectivity.is_online() {
            if let SkillforgeError::Unreachable { message } = err {
                return SkillforgeError::Offline { message };
            }
        }
        err
    }
}
