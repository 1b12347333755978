use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, Response};
use reqwest::Client;
use std::time::Duration;
use url::Url;

use crate::errors::{SkillforgeError, SkillforgeResult};
use crate::transport::{BoxStream, HttpTransport, RequestBody};

/// Reqwest-based HTTP transport implementation.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with its own connection pool.
    ///
    /// The timeout here is a whole-transport backstop; callers bound
    /// individual requests separately.
    pub fn new(timeout: Duration) -> SkillforgeResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            SkillforgeError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            }
        })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: Option<RequestBody>,
    ) -> SkillforgeResult<Response<Bytes>> {
        let mut request = self.client.request(method, url).headers(headers);

        request = match body {
            Some(RequestBody::Json(value)) => request.json(&value),
            Some(RequestBody::Bytes(data)) => request.body(data.to_vec()),
            Some(RequestBody::Multipart(payload)) => request.multipart(payload.into_form()),
            None => request,
        };

        let response = request.send().await?;

        let status = response.status();
        let response_headers = response.headers().clone();
        let body_bytes = response.bytes().await?;

        let mut builder = Response::builder().status(status);
        for (name, value) in response_headers.iter() {
            builder = builder.header(name.as_str(), value.as_bytes());
        }
        builder
            .body(body_bytes)
            .map_err(|e| SkillforgeError::Unreachable {
                message: format!("Malformed response: {}", e),
            })
    }

    async fn send_streaming(
        &self,
        method: Method,
        url: Url,
        headers: HeaderMap,
    ) -> SkillforgeResult<BoxStream<Bytes>> {
        let response = self
            .client
            .request(method, url)
            .headers(headers)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await?;
            return Err(SkillforgeError::from_response(status.as_u16(), &body));
        }

        let stream = response.bytes_stream();
        let mapped = Box::pin(futures::stream::unfold(stream, |mut stream| async move {
            use futures::StreamExt;
            match stream.next().await {
                Some(Ok(bytes)) => Some((Ok(bytes), stream)),
                Some(Err(e)) => Some((
                    Err(SkillforgeError::Stream {
                        message: format!("Stream error: {}", e),
                    }),
                    stream,
                )),
                None => None,
            }
        }));

        Ok(mapped)
    }
}
