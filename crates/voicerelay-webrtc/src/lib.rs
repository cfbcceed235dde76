//! Peer connection negotiation for voicerelay.
//!
//! [`PeerNegotiationCoordinator`] drives the offer/answer/ICE exchange for one
//! client. The media stack sits behind the [`PeerConnector`] and
//! [`PeerConnection`] traits; [`RtcPeerConnector`] implements them on top of
//! the `webrtc` crate.

pub mod coordinator;
pub mod error;
pub mod peer;
pub mod signal;

pub use coordinator::PeerNegotiationCoordinator;
pub use error::PeerError;
pub use peer::{PeerConnection, PeerConnector, PeerEventSender, RtcPeerConnector};
pub use signal::{IceCandidate, PeerEvent, RemoteTrack, SdpKind, SessionDescription, SignalingState};

/// Result type for negotiation operations.
pub type Result<T> = std::result::Result<T, PeerError>;
