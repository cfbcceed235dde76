//! Offer/answer/ICE state machine for one client.

use crate::error::PeerError;
use crate::peer::{PeerConnection, PeerConnector, PeerEventSender};
use crate::signal::{IceCandidate, PeerEvent, RemoteTrack, SdpKind, SessionDescription, SignalingState};
use crate::Result;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Negotiates one peer connection on behalf of a client.
///
/// The peer connection is created lazily on the first offer (or relay-initiated
/// offer). Candidates that arrive before a remote description are queued and
/// applied in arrival order once one is set.
pub struct PeerNegotiationCoordinator {
    connector: Arc<dyn PeerConnector>,
    peer: Option<Box<dyn PeerConnection>>,
    state: SignalingState,
    local_description: Option<SessionDescription>,
    remote_description: Option<SessionDescription>,
    pending_candidates: VecDeque<IceCandidate>,
    remote_tracks: Vec<RemoteTrack>,
    generation: u64,
    events_tx: mpsc::UnboundedSender<(u64, PeerEvent)>,
    events_rx: mpsc::UnboundedReceiver<(u64, PeerEvent)>,
}

impl std::fmt::Debug for PeerNegotiationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerNegotiationCoordinator")
            .field("state", &self.state)
            .field("has_peer", &self.peer.is_some())
            .field("pending_candidates", &self.pending_candidates.len())
            .finish()
    }
}

impl PeerNegotiationCoordinator {
    pub fn new(connector: Arc<dyn PeerConnector>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            connector,
            peer: None,
            state: SignalingState::None,
            local_description: None,
            remote_description: None,
            pending_candidates: VecDeque::new(),
            remote_tracks: Vec::new(),
            generation: 0,
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self) -> SignalingState {
        self.state
    }

    pub fn has_peer(&self) -> bool {
        self.peer.is_some()
    }

    pub fn local_description(&self) -> Option<&SessionDescription> {
        self.local_description.as_ref()
    }

    pub fn remote_description(&self) -> Option<&SessionDescription> {
        self.remote_description.as_ref()
    }

    /// Candidates waiting for a remote description.
    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    /// Tracks the remote peer has attached so far.
    pub fn remote_tracks(&self) -> &[RemoteTrack] {
        &self.remote_tracks
    }

    /// Answer a remote offer. Valid from `none` or `stable`.
    ///
    /// On failure before the remote description is applied, nothing changes.
    /// If answering fails afterwards the peer is torn down.
    pub async fn handle_offer(&mut self, offer: SessionDescription) -> Result<SessionDescription> {
        if offer.kind != SdpKind::Offer {
            return Err(PeerError::negotiation("expected an offer"));
        }
        match self.state {
            SignalingState::None | SignalingState::Stable => {}
            SignalingState::HaveLocalOffer => {
                return Err(PeerError::negotiation(
                    "offer received while a local offer is pending",
                ));
            }
            state => {
                return Err(PeerError::negotiation(format!(
                    "offer received in state {}",
                    state
                )));
            }
        }

        let created = self.ensure_peer().await?;
        let Some(peer) = self.peer.as_ref() else {
            return Err(PeerError::negotiation("peer connection unavailable"));
        };

        let applied = peer.set_remote_description(offer.clone()).await;
        if let Err(e) = applied {
            if created {
                self.discard_peer().await;
            }
            return Err(e);
        }
        self.remote_description = Some(offer);
        self.state = SignalingState::HaveRemoteOffer;
        self.drain_pending().await;

        match self.answer().await {
            Ok(answer) => {
                self.local_description = Some(answer.clone());
                self.state = SignalingState::Stable;
                info!("Peer negotiation stable");
                Ok(answer)
            }
            Err(e) => {
                warn!("Failed to answer offer, closing peer: {}", e);
                self.close().await;
                Err(PeerError::negotiation(format!("failed to answer offer: {}", e)))
            }
        }
    }

    /// Apply the remote answer to a pending local offer.
    pub async fn handle_answer(&mut self, answer: SessionDescription) -> Result<()> {
        if answer.kind != SdpKind::Answer {
            return Err(PeerError::negotiation("expected an answer"));
        }
        if self.state != SignalingState::HaveLocalOffer {
            return Err(PeerError::negotiation(format!(
                "answer received in state {}",
                self.state
            )));
        }
        let Some(peer) = self.peer.as_ref() else {
            return Err(PeerError::negotiation("no peer connection"));
        };

        peer.set_remote_description(answer.clone()).await?;
        self.remote_description = Some(answer);
        self.state = SignalingState::Stable;
        self.drain_pending().await;
        info!("Peer negotiation stable");
        Ok(())
    }

    /// Apply a remote candidate, or queue it until a remote description exists.
    pub async fn handle_ice_candidate(&mut self, candidate: IceCandidate) -> Result<()> {
        match self.peer.as_ref() {
            Some(peer) if self.remote_description.is_some() => {
                peer.add_ice_candidate(candidate).await
            }
            _ => {
                self.pending_candidates.push_back(candidate);
                debug!(
                    "Queued ICE candidate ({} pending)",
                    self.pending_candidates.len()
                );
                Ok(())
            }
        }
    }

    /// Create a relay-initiated offer, optionally restarting ICE.
    ///
    /// Valid from `none` or `stable`; enters `have-local-offer`.
    pub async fn create_offer(&mut self, ice_restart: bool) -> Result<SessionDescription> {
        if !matches!(self.state, SignalingState::None | SignalingState::Stable) {
            return Err(PeerError::negotiation(format!(
                "cannot create an offer in state {}",
                self.state
            )));
        }

        let created = self.ensure_peer().await?;
        let offer = match self.local_offer(ice_restart).await {
            Ok(offer) => offer,
            Err(e) => {
                if created {
                    self.discard_peer().await;
                }
                return Err(e);
            }
        };
        self.local_description = Some(offer.clone());
        self.state = SignalingState::HaveLocalOffer;
        info!(ice_restart, "Created local offer");
        Ok(offer)
    }

    /// Release the peer connection and reset to `none`. Never fails.
    pub async fn close(&mut self) {
        self.pending_candidates.clear();
        self.remote_tracks.clear();
        self.local_description = None;
        self.remote_description = None;
        self.state = SignalingState::None;

        if let Some(peer) = self.peer.take() {
            if let Err(e) = peer.close().await {
                debug!("Peer close failed: {}", e);
            }
            info!("Peer connection closed");
        }
    }

    /// Wait for the next event from the live peer connection.
    ///
    /// Events from peers that were since closed are dropped. Remote tracks are
    /// recorded before being returned. Cancel-safe.
    pub async fn next_event(&mut self) -> PeerEvent {
        loop {
            let Some((generation, event)) = self.events_rx.recv().await else {
                // We hold a sender, so the channel never closes.
                return std::future::pending().await;
            };
            if generation != self.generation || self.peer.is_none() {
                debug!("Dropping event from a closed peer");
                continue;
            }
            if let PeerEvent::RemoteTrack(track) = &event {
                self.remote_tracks.push(track.clone());
            }
            return event;
        }
    }

    /// Create the peer connection if absent. Returns whether one was created.
    async fn ensure_peer(&mut self) -> Result<bool> {
        if self.peer.is_some() {
            return Ok(false);
        }
        self.generation += 1;
        let sender = PeerEventSender::new(self.generation, self.events_tx.clone());
        let peer = self.connector.connect(sender).await?;
        debug!("Created peer connection");
        self.peer = Some(peer);
        Ok(true)
    }

    /// Drop a peer created by a failed call. Queued candidates stay queued.
    async fn discard_peer(&mut self) {
        if let Some(peer) = self.peer.take() {
            if let Err(e) = peer.close().await {
                debug!("Peer close failed: {}", e);
            }
            debug!("Discarded peer connection after failed negotiation");
        }
    }

    async fn local_offer(&self, ice_restart: bool) -> Result<SessionDescription> {
        let Some(peer) = self.peer.as_ref() else {
            return Err(PeerError::negotiation("peer connection unavailable"));
        };
        let offer = peer.create_offer(ice_restart).await?;
        peer.set_local_description(offer.clone()).await?;
        Ok(offer)
    }

    async fn answer(&self) -> Result<SessionDescription> {
        let Some(peer) = self.peer.as_ref() else {
            return Err(PeerError::negotiation("no peer connection"));
        };
        let answer = peer.create_answer().await?;
        peer.set_local_description(answer.clone()).await?;
        Ok(answer)
    }

    async fn drain_pending(&mut self) {
        let Some(peer) = self.peer.as_ref() else {
            return;
        };
        if self.pending_candidates.is_empty() {
            return;
        }

        debug!("Applying {} queued ICE candidates", self.pending_candidates.len());
        while let Some(candidate) = self.pending_candidates.pop_front() {
            let line = candidate.candidate.clone();
            if let Err(e) = peer.add_ice_candidate(candidate).await {
                warn!("Failed to apply queued candidate '{}': {}", line, e);
            }
        }
    }
}
