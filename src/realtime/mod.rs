//! Realtime channels: duplex WebSocket streams and server-sent events.
//!
//! Both channels deliver frames as they arrive and leave reconnection to the
//! consumer. The duplex side authenticates with a hello frame before any
//! other traffic; the one-way side decodes the SSE wire format from a raw
//! byte stream and closes on the first transport error.

mod duplex;
mod sse;

pub use duplex::{DuplexStream, StreamMessage};
pub use sse::{EventStream, ServerEvent};
