use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::errors::{SkillforgeError, SkillforgeResult};
use crate::DEFAULT_TIMEOUT_SECS;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One frame on a duplex stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    /// UTF-8 text frame
    Text(String),
    /// Binary frame
    Binary(Bytes),
    /// The stream has closed; no further frames follow
    Closed,
}

impl StreamMessage {
    /// Text frame carrying a JSON-encoded value.
    pub fn json<T: Serialize>(value: &T) -> SkillforgeResult<Self> {
        Ok(StreamMessage::Text(serde_json::to_string(value)?))
    }

    /// Parse the frame payload as JSON.
    pub fn parse_json<T: DeserializeOwned>(&self) -> SkillforgeResult<T> {
        match self {
            StreamMessage::Text(text) => Ok(serde_json::from_str(text)?),
            StreamMessage::Binary(data) => Ok(serde_json::from_slice(data)?),
            StreamMessage::Closed => Err(SkillforgeError::Stream {
                message: "Close frames carry no payload".to_string(),
            }),
        }
    }

    /// The payload as text, for text frames.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            StreamMessage::Text(text) => Some(text),
            _ => None,
        }
    }

    /// True for the close marker.
    pub fn is_closed(&self) -> bool {
        matches!(self, StreamMessage::Closed)
    }
}

impl From<StreamMessage> for WsMessage {
    fn from(message: StreamMessage) -> Self {
        match message {
            StreamMessage::Text(text) => WsMessage::Text(text),
            StreamMessage::Binary(data) => WsMessage::Binary(data.to_vec()),
            StreamMessage::Closed => WsMessage::Close(None),
        }
    }
}

/// Two-way message stream over a WebSocket connection.
///
/// Reading and writing run on their own tasks, so sends never block on a
/// slow reader and frames arrive while the consumer is busy. When a
/// credential is supplied at connect time, the auth hello
/// `{"type":"auth","token":...}` goes out as the first frame, before any
/// consumer traffic.
#[derive(Debug)]
pub struct DuplexStream {
    outgoing: mpsc::UnboundedSender<StreamMessage>,
    incoming: mpsc::UnboundedReceiver<StreamMessage>,
    closed: bool,
}

impl DuplexStream {
    /// Connect with the default timeout.
    pub async fn connect(url: &str, token: Option<&str>) -> SkillforgeResult<Self> {
        Self::connect_with_timeout(url, token, Duration::from_secs(DEFAULT_TIMEOUT_SECS)).await
    }

    /// Connect, bounding the handshake by `timeout`.
    pub async fn connect_with_timeout(
        url: &str,
        token: Option<&str>,
        timeout: Duration,
    ) -> SkillforgeResult<Self> {
        let (mut socket, _response) = tokio::time::timeout(timeout, connect_async(url))
            .await
            .map_err(|_| SkillforgeError::Unreachable {
                message: format!(
                    "WebSocket connect timed out after {}ms",
                    timeout.as_millis()
                ),
            })??;

        if let Some(token) = token {
            let hello = serde_json::json!({"type": "auth", "token": token});
            socket.send(WsMessage::Text(hello.to_string())).await?;
        }

        let (write, read) = socket.split();
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::writer_task(write, outgoing_rx));
        tokio::spawn(Self::reader_task(read, incoming_tx));

        Ok(Self {
            outgoing: outgoing_tx,
            incoming: incoming_rx,
            closed: false,
        })
    }

    async fn writer_task(
        mut write: SplitSink<Socket, WsMessage>,
        mut outgoing: mpsc::UnboundedReceiver<StreamMessage>,
    ) {
        while let Some(message) = outgoing.recv().await {
            let close = message.is_closed();
            if write.send(message.into()).await.is_err() {
                break;
            }
            if close {
                break;
            }
        }
        let _ = write.close().await;
    }

    async fn reader_task(
        mut read: SplitStream<Socket>,
        incoming: mpsc::UnboundedSender<StreamMessage>,
    ) {
        while let Some(frame) = read.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => {
                    if incoming.send(StreamMessage::Text(text)).is_err() {
                        break;
                    }
                }
                Ok(WsMessage::Binary(data)) => {
                    if incoming.send(StreamMessage::Binary(Bytes::from(data))).is_err() {
                        break;
                    }
                }
                Ok(WsMessage::Close(_)) => {
                    let _ = incoming.send(StreamMessage::Closed);
                    break;
                }
                // Pings are answered at the protocol layer.
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "duplex read failed");
                    break;
                }
            }
        }
    }

    /// Queue a frame for sending.
    pub fn send(&self, message: StreamMessage) -> SkillforgeResult<()> {
        if self.closed {
            return Err(SkillforgeError::Stream {
                message: "Stream is closed".to_string(),
            });
        }
        self.outgoing
            .send(message)
            .map_err(|_| SkillforgeError::Stream {
                message: "Stream writer has shut down".to_string(),
            })
    }

    /// Queue a text frame.
    pub fn send_text(&self, text: impl Into<String>) -> SkillforgeResult<()> {
        self.send(StreamMessage::Text(text.into()))
    }

    /// Queue a JSON-encoded text frame.
    pub fn send_json<T: Serialize>(&self, value: &T) -> SkillforgeResult<()> {
        self.send(StreamMessage::json(value)?)
    }

    /// Next frame from the peer; `None` once the stream has fully shut down.
    pub async fn recv(&mut self) -> Option<StreamMessage> {
        self.incoming.recv().await
    }

    /// Next frame if one is already buffered.
    pub fn try_recv(&mut self) -> Option<StreamMessage> {
        self.incoming.try_recv().ok()
    }

    /// Close the stream; the close frame is the last one sent.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            let _ = self.outgoing.send(StreamMessage::Closed);
        }
    }

    /// Whether this side has closed the stream.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for DuplexStream {
    fn drop(&mut self) {
        self.close();
    }
}
