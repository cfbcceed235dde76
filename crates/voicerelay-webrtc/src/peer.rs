//! Peer connection seam and its `webrtc` crate implementation.

use crate::error::PeerError;
use crate::signal::{IceCandidate, PeerEvent, RemoteTrack, SdpKind, SessionDescription};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use voicerelay_core::config::WebRtcConfig;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::offer_answer_options::RTCOfferOptions;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;

/// Sender half handed to a peer for its asynchronous events.
///
/// Events carry the generation of the peer that produced them so the
/// coordinator can drop stragglers from a closed peer.
#[derive(Debug, Clone)]
pub struct PeerEventSender {
    generation: u64,
    tx: mpsc::UnboundedSender<(u64, PeerEvent)>,
}

impl PeerEventSender {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<(u64, PeerEvent)>) -> Self {
        Self { generation, tx }
    }

    /// Queue an event. Dropped silently once the coordinator is gone.
    pub fn send(&self, event: PeerEvent) {
        let _ = self.tx.send((self.generation, event));
    }
}

/// One negotiated peer connection.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Apply the remote offer or answer.
    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    /// Apply a locally created offer or answer.
    async fn set_local_description(&self, description: SessionDescription) -> Result<()>;

    /// Create an answer to the applied remote offer.
    async fn create_answer(&self) -> Result<SessionDescription>;

    /// Create an offer, optionally restarting ICE.
    async fn create_offer(&self, ice_restart: bool) -> Result<SessionDescription>;

    /// Add a remote candidate.
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    /// Close the connection and release its transports.
    async fn close(&self) -> Result<()>;
}

/// Factory for peer connections.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    /// Create a fresh connection that reports through `events`.
    async fn connect(&self, events: PeerEventSender) -> Result<Box<dyn PeerConnection>>;
}

/// [`PeerConnector`] backed by the `webrtc` crate.
#[derive(Debug, Clone)]
pub struct RtcPeerConnector {
    ice_servers: Vec<String>,
}

impl RtcPeerConnector {
    pub fn new(ice_servers: Vec<String>) -> Self {
        Self { ice_servers }
    }

    pub fn from_config(config: &WebRtcConfig) -> Self {
        Self::new(config.ice_servers.clone())
    }
}

#[async_trait]
impl PeerConnector for RtcPeerConnector {
    async fn connect(&self, events: PeerEventSender) -> Result<Box<dyn PeerConnection>> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let ice_servers = self
            .ice_servers
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .collect();

        let config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(config).await?);

        let candidates = events.clone();
        pc.on_ice_candidate(Box::new(move |candidate| {
            let candidates = candidates.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else {
                    debug!("ICE gathering complete");
                    return;
                };
                match candidate.to_json() {
                    Ok(init) => candidates.send(PeerEvent::LocalCandidate(IceCandidate {
                        candidate: init.candidate,
                        sdp_mid: init.sdp_mid,
                        sdp_mline_index: init.sdp_mline_index,
                        username_fragment: init.username_fragment,
                    })),
                    Err(e) => warn!("Failed to encode local candidate: {}", e),
                }
            })
        }));

        let states = events.clone();
        pc.on_peer_connection_state_change(Box::new(move |state| {
            info!("Peer connection state changed: {}", state);
            states.send(PeerEvent::ConnectionState(state.to_string()));
            Box::pin(async {})
        }));

        let tracks = events;
        pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            let tracks = tracks.clone();
            Box::pin(async move {
                let remote = RemoteTrack {
                    kind: track.kind().to_string(),
                    track_id: track.id(),
                    stream_id: track.stream_id(),
                };
                info!(
                    kind = %remote.kind,
                    codec = %track.codec().capability.mime_type,
                    "Remote track attached"
                );
                tracks.send(PeerEvent::RemoteTrack(remote));

                // Audio reaches the relay over the signaling socket; drain
                // RTP so the receive buffers never fill.
                tokio::spawn(async move {
                    let mut packets: u64 = 0;
                    while track.read_rtp().await.is_ok() {
                        packets += 1;
                    }
                    debug!("Remote track ended after {} packets", packets);
                });
            })
        }));

        Ok(Box::new(RtcPeer { inner: pc }))
    }
}

struct RtcPeer {
    inner: Arc<RTCPeerConnection>,
}

fn to_rtc(description: SessionDescription) -> Result<RTCSessionDescription> {
    let converted = match description.kind {
        SdpKind::Offer => RTCSessionDescription::offer(description.sdp),
        SdpKind::Answer => RTCSessionDescription::answer(description.sdp),
    };
    converted.map_err(|e| PeerError::InvalidSdp(e.to_string()))
}

#[async_trait]
impl PeerConnection for RtcPeer {
    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        let rtc = to_rtc(description)?;
        self.inner
            .set_remote_description(rtc)
            .await
            .map_err(|e| PeerError::InvalidSdp(e.to_string()))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        let rtc = to_rtc(description)?;
        self.inner
            .set_local_description(rtc)
            .await
            .map_err(|e| PeerError::InvalidSdp(e.to_string()))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self.inner.create_answer(None).await?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn create_offer(&self, ice_restart: bool) -> Result<SessionDescription> {
        // A relay-initiated offer needs at least one media section.
        if self.inner.get_transceivers().await.is_empty() {
            self.inner
                .add_transceiver_from_kind(
                    RTPCodecType::Audio,
                    Some(RTCRtpTransceiverInit {
                        direction: RTCRtpTransceiverDirection::Recvonly,
                        send_encodings: vec![],
                    }),
                )
                .await?;
        }

        let options = RTCOfferOptions {
            ice_restart,
            ..Default::default()
        };
        let offer = self.inner.create_offer(Some(options)).await?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: candidate.username_fragment,
        };
        self.inner
            .add_ice_candidate(init)
            .await
            .map_err(|e| PeerError::InvalidCandidate(e.to_string()))
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await?;
        Ok(())
    }
}
