//! Gateway error types.

use thiserror::Error;
use voicerelay_upstream::UpstreamError;
use voicerelay_webrtc::PeerError;

/// Errors that can occur in the gateway.
///
/// Errors raised while handling a client message are sent back to that
/// client as an `error` message using their `Display` text.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The inbound message could not be parsed.
    #[error("Malformed client message: {0}")]
    MalformedClientMessage(String),

    /// The inbound message type is not routed anywhere.
    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    /// Upstream session failure.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Peer negotiation failure.
    #[error(transparent)]
    Peer(#[from] PeerError),

    /// Workflow webhook failure.
    #[error("Webhook error: {0}")]
    Webhook(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Create a malformed-message error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedClientMessage(message.into())
    }
}
