//! Peer negotiation error types.

use thiserror::Error;

/// Errors raised while negotiating a peer connection.
#[derive(Debug, Error)]
pub enum PeerError {
    /// The request is not valid in the current signaling state.
    #[error("Negotiation error: {0}")]
    Negotiation(String),

    /// A session description was rejected.
    #[error("Invalid SDP: {0}")]
    InvalidSdp(String),

    /// An ICE candidate was rejected.
    #[error("Invalid ICE candidate: {0}")]
    InvalidCandidate(String),

    /// Error from the media stack.
    #[error("WebRTC error: {0}")]
    WebRtc(String),
}

impl PeerError {
    /// Create a negotiation error.
    pub fn negotiation(message: impl Into<String>) -> Self {
        Self::Negotiation(message.into())
    }
}

impl From<webrtc::Error> for PeerError {
    fn from(e: webrtc::Error) -> Self {
        Self::WebRtc(e.to_string())
    }
}
