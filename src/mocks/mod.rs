//! Mock implementations for testing.
//!
//! Scripted doubles for the injected capabilities, so pipeline behavior can
//! be exercised without a network, real time, or a host UI.

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, Response};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

use crate::errors::{SkillforgeError, SkillforgeResult};
use crate::events::{ClientEvents, NavigationHint, Severity};
use crate::resilience::Sleeper;
use crate::transport::{BoxStream, Connectivity, HttpTransport, RequestBody};

/// Response recipe a [`MockTransport`] replays for a route.
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl ScriptedResponse {
    /// JSON response with the given status.
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Bytes::from(body.to_string()),
        }
    }

    /// Plain text response with the given status.
    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body: Bytes::copy_from_slice(body.as_bytes()),
        }
    }

    /// Bare status with an empty body.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Raw bytes with an explicit content type.
    pub fn bytes(status: u16, content_type: &str, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), content_type.to_string())],
            body: body.into(),
        }
    }

    /// Attach a response header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    fn build(&self) -> SkillforgeResult<Response<Bytes>> {
        let mut builder = Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
            .body(self.body.clone())
            .map_err(|e| SkillforgeError::Unreachable {
                message: format!("bad scripted response: {}", e),
            })
    }
}

/// One request as the mock transport saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request method
    pub method: Method,
    /// Fully resolved request URL
    pub url: Url,
    /// Headers as assembled by the pipeline
    pub headers: HeaderMap,
    /// Request body, when one was attached
    pub body: Option<RequestBody>,
}

/// Scripted HTTP transport that records every request.
///
/// Routes are keyed by `"<METHOD> <path>"`; the same recipe replays for
/// every hit so call-count assertions stay simple.
pub struct MockTransport {
    script: Mutex<HashMap<String, Result<ScriptedResponse, SkillforgeError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    /// Transport with an empty script.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Script a response for a route, e.g. `("GET", "/jobs")`.
    pub fn expect_response(&self, method: &str, path: &str, response: ScriptedResponse) {
        self.script
            .lock()
            .unwrap()
            .insert(format!("{} {}", method, path), Ok(response));
    }

    /// Script a transport-level failure for a route.
    pub fn expect_error(&self, method: &str, path: &str, error: SkillforgeError) {
        self.script
            .lock()
            .unwrap()
            .insert(format!("{} {}", method, path), Err(error));
    }

    /// Everything sent through this transport, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests that hit a route.
    pub fn calls(&self, method: &str, path: &str) -> usize {
        let method: Method = method.parse().unwrap();
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.url.path() == path)
            .count()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(
        &self,
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: Option<RequestBody>,
    ) -> SkillforgeResult<Response<Bytes>> {
        let key = format!("{} {}", method, url.path());
        self.requests.lock().unwrap().push(RecordedRequest {
            method,
            url,
            headers,
            body,
        });
        match self.script.lock().unwrap().get(&key) {
            Some(Ok(recipe)) => recipe.build(),
            Some(Err(error)) => Err(error.clone()),
            None => Err(SkillforgeError::Unreachable {
                message: format!("no scripted response for {}", key),
            }),
        }
    }

    async fn send_streaming(
        &self,
        _method: Method,
        _url: Url,
        _headers: HeaderMap,
    ) -> SkillforgeResult<BoxStream<Bytes>> {
        Err(SkillforgeError::Stream {
            message: "streaming is not scripted on MockTransport".to_string(),
        })
    }
}

/// Events observer that records everything it sees.
#[derive(Default)]
pub struct RecordingEvents {
    notifications: Mutex<Vec<(String, Severity)>>,
    navigations: Mutex<Vec<(NavigationHint, Option<String>)>>,
}

impl RecordingEvents {
    /// Observer with nothing recorded yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications seen so far, in order.
    pub fn notifications(&self) -> Vec<(String, Severity)> {
        self.notifications.lock().unwrap().clone()
    }

    /// Navigation requests seen so far, in order.
    pub fn navigations(&self) -> Vec<(NavigationHint, Option<String>)> {
        self.navigations.lock().unwrap().clone()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.notifications.lock().unwrap().is_empty() && self.navigations.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl ClientEvents for RecordingEvents {
    async fn notify(&self, message: &str, severity: Severity) {
        self.notifications
            .lock()
            .unwrap()
            .push((message.to_string(), severity));
    }

    async fn navigate(&self, hint: NavigationHint, return_to: Option<&str>) {
        self.navigations
            .lock()
            .unwrap()
            .push((hint, return_to.map(|s| s.to_string())));
    }
}

/// Sleeper that records requested pauses and returns immediately.
#[derive(Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    /// Sleeper with nothing recorded yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pauses requested so far, in order.
    pub fn recorded(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

/// Connectivity signal that reports the network as down.
pub struct OfflineConnectivity;

impl Connectivity for OfflineConnectivity {
    fn is_online(&self) -> bool {
        false
    }
}
