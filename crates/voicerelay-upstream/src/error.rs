//! Error types for the upstream session client.

use std::time::Duration;
use thiserror::Error;

/// Upstream error types.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The connection could not be opened or authenticated.
    #[error("Upstream unavailable: {0}")]
    Unavailable(String),

    /// The open handshake did not complete in time.
    #[error("Upstream unavailable: open handshake timed out after {0:?}")]
    Timeout(Duration),

    /// An inbound event was malformed or unexpected.
    #[error("Upstream protocol error: {0}")]
    Protocol(String),

    /// WebSocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl UpstreamError {
    /// Create an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Whether the service could not be reached at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_) | Self::WebSocket(_))
    }
}
