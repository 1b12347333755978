//! Error types for the Skillforge API client.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for Skillforge operations
pub type SkillforgeResult<T> = Result<T, SkillforgeError>;

/// Main error type for the Skillforge API client.
///
/// Failures reported by the server keep their status and decoded payload so
/// callers can branch on them; failures that never reached the server are
/// split by whether connectivity was known to be down at the time.
#[derive(Error, Debug, Clone)]
pub enum SkillforgeError {
    /// The server replied with a non-success status code
    #[error("{message}")]
    Http {
        /// HTTP status code of the response
        status: u16,
        /// Message from the error body, or a synthesized status line
        message: String,
        /// Decoded JSON error body, when the server sent one
        payload: Option<serde_json::Value>,
    },

    /// The transport failed while connectivity was known to be down
    #[error("Offline: {message}")]
    Offline {
        /// Description of the failed attempt
        message: String,
    },

    /// The transport failed to produce a response (DNS, refused, timeout)
    #[error("Service unreachable: {message}")]
    Unreachable {
        /// Description of the transport failure
        message: String,
    },

    /// A retried operation failed on its final permitted attempt
    #[error("Retry budget exhausted after {attempts} attempts: {source}")]
    Exhausted {
        /// Number of attempts that were made
        attempts: u32,
        /// The error from the last attempt, unchanged
        source: Box<SkillforgeError>,
    },

    /// Dispatch was denied before any transport attempt
    #[error("Rate limit exceeded for {endpoint}, retry after {}s", retry_after.as_secs())]
    RateLimited {
        /// Endpoint whose window is at its ceiling
        endpoint: String,
        /// Time remaining until the window resets
        retry_after: Duration,
    },

    /// Configuration error (invalid settings, missing required fields)
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Serialization error (request or response body could not be coded)
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the serialization issue
        message: String,
    },

    /// Storage error (the key-value capability failed)
    #[error("Storage error: {message}")]
    Storage {
        /// Error message describing the storage issue
        message: String,
    },

    /// Streaming error (event stream parse failures, stream interruption)
    #[error("Stream error: {message}")]
    Stream {
        /// Error message describing the stream issue
        message: String,
    },
}

impl SkillforgeError {
    /// Classify a non-success response into an [`SkillforgeError::Http`].
    ///
    /// Pure: parses the body as a structured error and extracts its message
    /// (`message`, `error`, or `error.message`); when nothing parses, the
    /// message is synthesized from the status line.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let payload: Option<serde_json::Value> = serde_json::from_slice(body).ok();
        let message = payload
            .as_ref()
            .and_then(Self::body_message)
            .unwrap_or_else(|| {
                let reason = http::StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("Unknown Status");
                format!("HTTP {}: {}", status, reason)
            });
        SkillforgeError::Http {
            status,
            message,
            payload,
        }
    }

    fn body_message(payload: &serde_json::Value) -> Option<String> {
        if let Some(message) = payload.get("message").and_then(|m| m.as_str()) {
            return Some(message.to_string());
        }
        match payload.get("error") {
            Some(serde_json::Value::String(message)) => Some(message.clone()),
            Some(error) => error
                .get("message")
                .and_then(|m| m.as_str())
                .map(|s| s.to_string()),
            None => None,
        }
    }

    /// Returns the HTTP status code when the server produced this error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            SkillforgeError::Http { status, .. } => Some(*status),
            SkillforgeError::Exhausted { source, .. } => source.status_code(),
            _ => None,
        }
    }

    /// Returns the time to wait before the endpoint accepts dispatch again.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SkillforgeError::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Returns true if the failure never produced a server response.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            SkillforgeError::Offline { .. } | SkillforgeError::Unreachable { .. }
        )
    }
}

// Conversions from common error types
impl From<reqwest::Error> for SkillforgeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SkillforgeError::Unreachable {
                message: format!("Request timed out: {}", err),
            }
        } else if err.is_connect() {
            SkillforgeError::Unreachable {
                message: format!("Connection failed: {}", err),
            }
        } else {
            SkillforgeError::Unreachable {
                message: format!("Transport error: {}", err),
            }
        }
    }
}

impl From<serde_json::Error> for SkillforgeError {
    fn from(err: serde_json::Error) -> Self {
        SkillforgeError::Serialization {
            message: format!("JSON encode/decode error: {}", err),
        }
    }
}

impl From<url::ParseError> for SkillforgeError {
    fn from(err: url::ParseError) -> Self {
        SkillforgeError::Configuration {
            message: format!("Invalid URL: {}", err),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SkillforgeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SkillforgeError::Stream {
            message: format!("WebSocket error: {}", err),
        }
    }
}
