//! HTTP transport capability and implementations.
//!
//! Transports are mechanical: they deliver a request and hand back the raw
//! response whatever its status. Deciding what a status means happens above,
//! so test doubles can stand in for the network without re-implementing any
//! client behavior.

mod http_transport;
mod multipart;

pub use http_transport::ReqwestTransport;
pub use multipart::{FilePart, MultipartPayload};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::Stream;
use http::{HeaderMap, Method, Response};
use std::pin::Pin;
use url::Url;

use crate::errors::SkillforgeResult;

/// Boxed stream of fallible items.
pub type BoxStream<T> = Pin<Box<dyn Stream<Item = SkillforgeResult<T>> + Send>>;

/// Body attached to an outgoing request.
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// JSON body, encoded by the transport
    Json(serde_json::Value),
    /// Raw bytes, sent as-is
    Bytes(Bytes),
    /// Multipart form; the transport generates the boundary
    Multipart(MultipartPayload),
}

/// HTTP transport trait for delivering requests to the Skillforge API.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request and return the raw response, whatever its status.
    async fn send(
        &self,
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: Option<RequestBody>,
    ) -> SkillforgeResult<Response<Bytes>>;

    /// Open a one-way byte stream from the given endpoint.
    async fn send_streaming(
        &self,
        method: Method,
        url: Url,
        headers: HeaderMap,
    ) -> SkillforgeResult<BoxStream<Bytes>>;
}

/// Host connectivity signal.
///
/// When a transport attempt fails and the host knows connectivity is down,
/// the failure surfaces as `Offline` instead of `Unreachable`.
pub trait Connectivity: Send + Sync {
    /// Whether the host currently believes it has network connectivity.
    fn is_online(&self) -> bool;
}

/// Connectivity signal for hosts without one: always up.
pub struct AlwaysOnline;

impl Connectivity for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}
