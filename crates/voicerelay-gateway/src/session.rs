//! Per-client connection session.
//!
//! A [`ConnectionSession`] exclusively owns one upstream session client and
//! one peer negotiation coordinator. Inbound client messages are routed by
//! [`ConnectionSession::handle_text`]; everything the session has to say on its
//! own (relay events, local ICE candidates, webhook results) comes out of
//! [`ConnectionSession::next_outbound`].

use crate::error::GatewayError;
use crate::protocol::{kinds, ClientEnvelope, ServerMessage, WebhookPayload};
use crate::webhook::WebhookClient;
use crate::Result;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use voicerelay_upstream::{StartOutcome, UpstreamSessionClient};
use voicerelay_webrtc::{IceCandidate, PeerEvent, PeerNegotiationCoordinator, SessionDescription};

/// Lifecycle of a connection session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Connected, nothing started yet.
    Idle,

    /// Peer signaling in progress.
    Negotiating,

    /// Upstream started or peer negotiation stable.
    Active,

    /// Ended by the client or by socket closure.
    Ended,
}

/// One client's session.
pub struct ConnectionSession {
    id: String,
    state: LifecycleState,
    upstream: UpstreamSessionClient,
    peer: PeerNegotiationCoordinator,
    webhook: WebhookClient,
    webhook_tx: mpsc::UnboundedSender<ServerMessage>,
    webhook_rx: mpsc::UnboundedReceiver<ServerMessage>,
    created_at: chrono::DateTime<chrono::Utc>,
    last_activity: chrono::DateTime<chrono::Utc>,
}

impl std::fmt::Debug for ConnectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("upstream", &self.upstream)
            .field("peer", &self.peer)
            .finish()
    }
}

impl ConnectionSession {
    pub fn new(
        id: impl Into<String>,
        upstream: UpstreamSessionClient,
        peer: PeerNegotiationCoordinator,
        webhook: WebhookClient,
    ) -> Self {
        let now = chrono::Utc::now();
        let (webhook_tx, webhook_rx) = mpsc::unbounded_channel();
        Self {
            id: id.into(),
            state: LifecycleState::Idle,
            upstream,
            peer,
            webhook,
            webhook_tx,
            webhook_rx,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn upstream(&self) -> &UpstreamSessionClient {
        &self.upstream
    }

    pub fn peer(&self) -> &PeerNegotiationCoordinator {
        &self.peer
    }

    pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> chrono::DateTime<chrono::Utc> {
        self.last_activity
    }

    /// Update last activity time.
    pub fn touch(&mut self) {
        self.last_activity = chrono::Utc::now();
    }

    /// Handle one inbound text frame and return the direct reply, if any.
    ///
    /// Failures are turned into an `error` reply; the session stays usable.
    pub async fn handle_text(&mut self, text: &str) -> Option<ServerMessage> {
        self.touch();
        let result = match ClientEnvelope::parse(text) {
            Ok(envelope) => self.dispatch(envelope).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(reply) => reply,
            Err(e) => {
                warn!(session_id = %self.id, "Client message failed: {}", e);
                Some(ServerMessage::from(&e))
            }
        }
    }

    /// Route one parsed message.
    pub async fn dispatch(&mut self, envelope: ClientEnvelope) -> Result<Option<ServerMessage>> {
        debug!(session_id = %self.id, "Received {}", envelope.kind);
        match envelope.kind.as_str() {
            kinds::START_SESSION => self.start_session().await.map(Some),
            kinds::END_SESSION => {
                self.teardown().await;
                Ok(Some(ServerMessage::SessionEnded))
            }
            kinds::AUDIO_DATA => {
                let audio = envelope.audio()?;
                self.upstream.send_audio_frame(&audio).await;
                Ok(None)
            }
            kinds::WEBRTC_OFFER => {
                let offer: SessionDescription = envelope.payload_as()?;
                let answer = self.peer.handle_offer(offer).await?;
                self.state = LifecycleState::Active;
                Ok(Some(ServerMessage::WebrtcAnswer { payload: answer }))
            }
            kinds::WEBRTC_ANSWER => {
                let answer: SessionDescription = envelope.payload_as()?;
                self.peer.handle_answer(answer).await?;
                self.state = LifecycleState::Active;
                Ok(None)
            }
            kinds::WEBRTC_ICE_CANDIDATE => {
                let candidate: IceCandidate = envelope.payload_as()?;
                self.peer.handle_ice_candidate(candidate).await?;
                self.begin_negotiation();
                Ok(None)
            }
            kinds::WEBRTC_RESTART_ICE => {
                let offer = self.peer.create_offer(true).await?;
                self.begin_negotiation();
                Ok(Some(ServerMessage::WebrtcOffer { payload: offer }))
            }
            kinds::TRIGGER_N8N => {
                self.trigger_webhook(envelope.payload.unwrap_or(Value::Null));
                Ok(None)
            }
            other => Err(GatewayError::UnknownMessageType(other.to_string())),
        }
    }

    /// Wait for the next message the session emits on its own.
    ///
    /// Cancel-safe, so it can sit in a `select!` beside the socket read.
    pub async fn next_outbound(&mut self) -> ServerMessage {
        loop {
            tokio::select! {
                event = self.upstream.next_event() => match event {
                    Some(event) => {
                        debug!(session_id = %self.id, "Relaying {}", event.name());
                        return ServerMessage::from(event);
                    }
                    None => {
                        warn!(session_id = %self.id, "Upstream connection closed");
                        return ServerMessage::error("Upstream connection closed");
                    }
                },
                event = self.peer.next_event() => {
                    if let Some(message) = self.peer_message(event) {
                        return message;
                    }
                }
                Some(message) = self.webhook_rx.recv() => return message,
            }
        }
    }

    /// Close both sub-components. Safe from any state, never fails.
    pub async fn teardown(&mut self) {
        self.upstream.end().await;
        self.peer.close().await;
        if self.state != LifecycleState::Ended {
            info!(session_id = %self.id, "Session ended");
        }
        self.state = LifecycleState::Ended;
    }

    async fn start_session(&mut self) -> Result<ServerMessage> {
        match self.upstream.start().await? {
            StartOutcome::Opened => info!(session_id = %self.id, "Upstream session started"),
            StartOutcome::AlreadyConnected => {
                info!(session_id = %self.id, "Redundant start_session ignored")
            }
        }
        self.state = LifecycleState::Active;
        Ok(ServerMessage::SessionStarted)
    }

    /// Called after a signaling step succeeds; failed steps leave the lifecycle alone.
    fn begin_negotiation(&mut self) {
        if matches!(self.state, LifecycleState::Idle | LifecycleState::Ended) {
            self.state = LifecycleState::Negotiating;
        }
    }

    fn peer_message(&self, event: PeerEvent) -> Option<ServerMessage> {
        match event {
            PeerEvent::LocalCandidate(candidate) => {
                Some(ServerMessage::WebrtcIceCandidate { payload: candidate })
            }
            PeerEvent::RemoteTrack(track) => {
                info!(
                    session_id = %self.id,
                    kind = %track.kind,
                    track_id = %track.track_id,
                    "Remote stream attached"
                );
                None
            }
            PeerEvent::ConnectionState(state) => {
                debug!(session_id = %self.id, "Peer connection {}", state);
                None
            }
        }
    }

    fn trigger_webhook(&self, data: Value) {
        let webhook = self.webhook.clone();
        let replies = self.webhook_tx.clone();
        let session_id = self.id.clone();
        tokio::spawn(async move {
            let reply = match webhook.trigger(&data).await {
                Ok(data) => ServerMessage::N8nResponse {
                    payload: WebhookPayload { data },
                },
                Err(e) => {
                    warn!(session_id = %session_id, "Webhook failed: {}", e);
                    ServerMessage::from(&e)
                }
            };
            // The session may be gone by now.
            let _ = replies.send(reply);
        });
    }
}
