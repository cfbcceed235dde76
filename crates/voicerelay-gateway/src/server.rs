//! WebSocket gateway server.

use crate::error::GatewayError;
use crate::protocol::ServerMessage;
use crate::session::ConnectionSession;
use crate::webhook::WebhookClient;
use crate::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, State, WebSocketUpgrade,
    },
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use voicerelay_core::config::{BindMode, Config};
use voicerelay_upstream::{UpstreamSessionClient, UpstreamSettings};
use voicerelay_webrtc::{PeerConnector, PeerNegotiationCoordinator, RtcPeerConnector};

/// Origins trusted by a loopback-bound gateway, matched as prefixes.
const LOCAL_ORIGINS: &[&str] = &[
    "http://localhost",
    "http://127.0.0.1",
    "https://localhost",
    "https://127.0.0.1",
];

/// Information about a connected client.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Session ID.
    pub id: String,

    /// Connection time.
    pub connected_at: chrono::DateTime<chrono::Utc>,

    /// Remote address.
    pub remote_addr: Option<SocketAddr>,
}

/// Gateway server state.
pub struct GatewayState {
    /// Configuration.
    pub config: Config,

    /// Live sessions by id.
    pub sessions: RwLock<HashMap<String, SessionInfo>>,

    upstream: UpstreamSettings,
    connector: Arc<dyn PeerConnector>,
    webhook: WebhookClient,

    /// Reserved connection slots, counted from upgrade until socket close.
    slots: AtomicUsize,
}

impl GatewayState {
    /// Settings every new session's upstream client starts from.
    pub fn upstream(&self) -> &UpstreamSettings {
        &self.upstream
    }

    /// Build a fresh session with its own upstream client and coordinator.
    pub fn new_session(&self, id: impl Into<String>) -> ConnectionSession {
        ConnectionSession::new(
            id,
            UpstreamSessionClient::new(self.upstream.clone()),
            PeerNegotiationCoordinator::new(self.connector.clone()),
            self.webhook.clone(),
        )
    }
}

/// The WebSocket gateway server.
pub struct Gateway {
    state: Arc<GatewayState>,
}

impl Gateway {
    /// Create a gateway backed by real peer connections.
    pub fn new(config: Config) -> Self {
        let connector = Arc::new(RtcPeerConnector::from_config(&config.webrtc));
        Self::with_connector(config, connector)
    }

    /// Create a gateway with a custom peer connector.
    pub fn with_connector(config: Config, connector: Arc<dyn PeerConnector>) -> Self {
        let upstream = UpstreamSettings::from_config(&config);
        Self::from_parts(config, upstream, connector)
    }

    /// Create a gateway from explicit upstream settings and peer connector.
    pub fn from_parts(
        config: Config,
        upstream: UpstreamSettings,
        connector: Arc<dyn PeerConnector>,
    ) -> Self {
        let state = Arc::new(GatewayState {
            webhook: WebhookClient::from_config(&config),
            upstream,
            connector,
            sessions: RwLock::new(HashMap::new()),
            slots: AtomicUsize::new(0),
            config,
        });

        Self { state }
    }

    pub fn state(&self) -> &Arc<GatewayState> {
        &self.state
    }

    /// Run the gateway server on the configured address.
    pub async fn run(&self) -> Result<()> {
        let addr = self.bind_address();

        if self.state.config.gateway.bind != BindMode::Loopback {
            warn!("Gateway binding to {}; it is reachable from the network", addr);
        }

        let listener = TcpListener::bind(addr).await.map_err(GatewayError::Io)?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let app = self.create_router();

        info!("Starting gateway server on {}", listener.local_addr()?);

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

        Ok(())
    }

    /// Create the Axum router.
    pub fn create_router(&self) -> Router {
        let state = self.state.clone();

        let mut router = Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http());

        if self.state.config.gateway.cors {
            router = router.layer(create_cors_layer(self.state.config.gateway.bind));
        }

        router
    }

    /// Get the bind address.
    pub fn bind_address(&self) -> SocketAddr {
        let ip = match self.state.config.gateway.bind {
            BindMode::Loopback => [127, 0, 0, 1],
            BindMode::Lan => [0, 0, 0, 0],
        };

        SocketAddr::from((ip, self.state.config.gateway.port))
    }

    /// Get live session count.
    pub async fn session_count(&self) -> usize {
        self.state.sessions.read().await.len()
    }
}

/// Loopback gateways only answer local pages; LAN gateways answer any origin.
fn create_cors_layer(bind: BindMode) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(std::time::Duration::from_secs(3600));

    match bind {
        BindMode::Loopback => layer.allow_origin(AllowOrigin::predicate(
            |origin: &HeaderValue, _| is_local_origin(origin),
        )),
        BindMode::Lan => layer.allow_origin(Any),
    }
}

fn is_local_origin(origin: &HeaderValue) -> bool {
    let Ok(origin) = origin.to_str() else {
        return false;
    };
    LOCAL_ORIGINS.iter().any(|allowed| {
        origin
            .strip_prefix(allowed)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(':'))
    })
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> std::result::Result<impl IntoResponse, StatusCode> {
    let Some(slot) = ConnectionSlot::acquire(&state) else {
        warn!(
            "Max connections ({}) reached, rejecting {}",
            state.config.gateway.max_connections, addr
        );
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, addr, slot)))
}

/// A reserved connection slot, released on drop.
///
/// Taken before the upgrade so concurrent handshakes cannot overshoot
/// `max_connections`. A failed upgrade drops the callback and frees the slot.
struct ConnectionSlot {
    state: Arc<GatewayState>,
}

impl ConnectionSlot {
    fn acquire(state: &Arc<GatewayState>) -> Option<Self> {
        let max = state.config.gateway.max_connections;
        state
            .slots
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            })
            .ok()?;
        Some(Self {
            state: state.clone(),
        })
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.state.slots.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Drive one client connection until either side closes.
async fn handle_socket(
    socket: WebSocket,
    state: Arc<GatewayState>,
    remote_addr: SocketAddr,
    _slot: ConnectionSlot,
) {
    let session_id = uuid::Uuid::new_v4().to_string();

    {
        let mut sessions = state.sessions.write().await;
        sessions.insert(
            session_id.clone(),
            SessionInfo {
                id: session_id.clone(),
                connected_at: chrono::Utc::now(),
                remote_addr: Some(remote_addr),
            },
        );
    }

    info!(session_id = %session_id, "Client connected from {}", remote_addr);

    let mut session = state.new_session(session_id.clone());
    let (mut sender, mut receiver) = socket.split();

    if send(&mut sender, &ServerMessage::connected(&session_id)).await {
        loop {
            tokio::select! {
                msg = receiver.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = session.handle_text(&text).await {
                            if !send(&mut sender, &reply).await {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(session_id = %session_id, "Client closed connection");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(session_id = %session_id, "WebSocket error: {}", e);
                        break;
                    }
                    Some(Ok(_)) => {}
                },
                outbound = session.next_outbound() => {
                    if !send(&mut sender, &outbound).await {
                        break;
                    }
                }
            }
        }
    }

    session.teardown().await;

    {
        let mut sessions = state.sessions.write().await;
        sessions.remove(&session_id);
    }

    info!(session_id = %session_id, "Client disconnected");
}

/// Send one message; `false` once the socket is unusable.
async fn send(sender: &mut SplitSink<WebSocket, Message>, message: &ServerMessage) -> bool {
    let text = match message.to_text() {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to encode {}: {}", message.kind(), e);
            return true;
        }
    };
    match sender.send(Message::Text(text)).await {
        Ok(()) => true,
        Err(e) => {
            debug!("Failed to send {}: {}", message.kind(), e);
            false
        }
    }
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let sessions = state.sessions.read().await.len();
    Json(serde_json::json!({
        "status": "ok",
        "sessions": sessions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[test]
    fn test_bind_address() {
        let gateway = Gateway::new(Config::default());
        assert_eq!(gateway.bind_address(), "127.0.0.1:8080".parse().unwrap());

        let mut config = Config::default();
        config.gateway.bind = BindMode::Lan;
        config.gateway.port = 9000;
        let gateway = Gateway::new(config);
        assert_eq!(gateway.bind_address(), "0.0.0.0:9000".parse().unwrap());
    }

    #[test]
    fn test_local_origin_matching() {
        let ok = |s: &str| is_local_origin(&HeaderValue::from_str(s).unwrap());
        assert!(ok("http://localhost"));
        assert!(ok("http://localhost:3000"));
        assert!(ok("https://127.0.0.1:8443"));
        assert!(!ok("http://localhost.evil.com"));
        assert!(!ok("https://example.com"));
    }

    #[test]
    fn test_new_session_starts_idle() {
        let gateway = Gateway::new(Config::default());
        let session = gateway.state().new_session("s1");
        assert_eq!(session.id(), "s1");
        assert_eq!(session.state(), crate::LifecycleState::Idle);
        assert!(!session.upstream().is_connected());
    }

    #[tokio::test]
    async fn test_session_count_starts_empty() {
        let gateway = Gateway::new(Config::default());
        assert_eq!(gateway.session_count().await, 0);
    }

    #[test]
    fn test_connection_slots_are_bounded() {
        let mut config = Config::default();
        config.gateway.max_connections = 2;
        let gateway = Gateway::new(config);
        let state = gateway.state();

        let first = ConnectionSlot::acquire(state).unwrap();
        let second = ConnectionSlot::acquire(state).unwrap();
        assert!(ConnectionSlot::acquire(state).is_none());

        drop(first);
        let third = ConnectionSlot::acquire(state);
        assert!(third.is_some());
        drop(second);
        drop(third);
        assert_eq!(state.slots.load(Ordering::Acquire), 0);
    }

    #[tokio::test]
    async fn test_concurrent_slot_requests_respect_limit() {
        let mut config = Config::default();
        config.gateway.max_connections = 3;
        let state = Gateway::new(config).state().clone();

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let state = state.clone();
                tokio::spawn(async move { ConnectionSlot::acquire(&state) })
            })
            .collect();
        let mut held = Vec::new();
        for task in tasks {
            if let Some(slot) = task.await.unwrap() {
                held.push(slot);
            }
        }
        assert_eq!(held.len(), 3);
    }

    #[test]
    fn test_from_parts_uses_given_upstream() {
        let upstream = UpstreamSettings::new("ws://127.0.0.1:9/v1/realtime", "gpt-local");
        let connector = Arc::new(RtcPeerConnector::from_config(&Config::default().webrtc));
        let gateway = Gateway::from_parts(Config::default(), upstream, connector);

        // Cloning the state first must not matter: settings are fixed at build time.
        let state = gateway.state().clone();
        assert_eq!(state.upstream().url, "ws://127.0.0.1:9/v1/realtime");
        assert_eq!(state.upstream().model, "gpt-local");
    }

    #[tokio::test]
    async fn test_health_route() {
        let router = Gateway::new(Config::default()).create_router();
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_loopback_cors_rejects_remote_origin() {
        let router = Gateway::new(Config::default()).create_router();

        let local = router
            .clone()
            .oneshot(
                Request::get("/health")
                    .header(header::ORIGIN, "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            local.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:3000"
        );

        let remote = router
            .oneshot(
                Request::get("/health")
                    .header(header::ORIGIN, "https://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(remote
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[tokio::test]
    async fn test_lan_cors_allows_any_origin() {
        let mut config = Config::default();
        config.gateway.bind = BindMode::Lan;
        let router = Gateway::new(config).create_router();

        let response = router
            .oneshot(
                Request::get("/health")
                    .header(header::ORIGIN, "https://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }
}
