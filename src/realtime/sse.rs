use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use serde::de::DeserializeOwned;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::errors::SkillforgeResult;
use crate::transport::BoxStream;

/// One event from a server-sent event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEvent {
    /// Event type from the `event:` field, when the server named one
    pub event: Option<String>,
    /// Event payload; multiple `data:` lines join with newlines
    pub data: String,
    /// Event id from the `id:` field, when present
    pub id: Option<String>,
}

impl ServerEvent {
    fn from_block(block: &[u8]) -> Self {
        let text = String::from_utf8_lossy(block);
        let mut event = None;
        let mut data_lines = Vec::new();
        let mut id = None;

        for line in text.lines() {
            // Lines starting with a colon are keepalive comments.
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            if let Some(rest) = line.strip_prefix("event:") {
                event = Some(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("data:") {
                data_lines.push(rest.trim());
            } else if let Some(rest) = line.strip_prefix("id:") {
                id = Some(rest.trim().to_string());
            }
        }

        Self {
            event,
            data: data_lines.join("\n"),
            id,
        }
    }

    fn is_empty(&self) -> bool {
        self.event.is_none() && self.data.is_empty() && self.id.is_none()
    }

    /// Parse the event data as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> SkillforgeResult<T> {
        Ok(serde_json::from_str(&self.data)?)
    }
}

pin_project! {
    /// One-way event stream decoded from a raw byte stream.
    ///
    /// Chunks accumulate in a buffer and split into events on blank lines,
    /// so an event arriving across several chunks still comes out whole. The
    /// first transport error surfaces once and closes the stream; consumers
    /// reconnect explicitly when they want to resume.
    pub struct EventStream {
        #[pin]
        inner: BoxStream<Bytes>,
        buffer: Vec<u8>,
        done: bool,
    }
}

impl EventStream {
    /// Decode events from the given byte stream.
    pub fn new(inner: BoxStream<Bytes>) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            done: false,
        }
    }
}

/// First blank-line separator in the buffer, as (offset, separator length).
fn find_separator(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n");
    let crlf = buffer.windows(4).position(|w| w == b"\r\n\r\n");
    match (lf, crlf) {
        (Some(l), Some(c)) if c < l => Some((c, 4)),
        (Some(l), _) => Some((l, 2)),
        (None, Some(c)) => Some((c, 4)),
        (None, None) => None,
    }
}

impl Stream for EventStream {
    type Item = SkillforgeResult<ServerEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }

        loop {
            // Hand out buffered events before asking the transport for more.
            if let Some((offset, width)) = find_separator(this.buffer) {
                let block: Vec<u8> = this.buffer.drain(..offset + width).collect();
                let event = ServerEvent::from_block(&block[..offset]);
                if event.is_empty() {
                    continue;
                }
                return Poll::Ready(Some(Ok(event)));
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    this.buffer.extend_from_slice(&chunk);
                }
                Poll::Ready(Some(Err(err))) => {
                    *this.done = true;
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => {
                    *this.done = true;
                    if !this.buffer.is_empty() {
                        let block: Vec<u8> = this.buffer.drain(..).collect();
                        let event = ServerEvent::from_block(&block);
                        if !event.is_empty() {
                            return Poll::Ready(Some(Ok(event)));
                        }
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
