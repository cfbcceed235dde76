//! End-to-end gateway tests over real sockets.
//!
//! A browser-side client talks to a served gateway, which in turn talks to a
//! scripted realtime service. Peer connections are canned so no media stack
//! is involved.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use voicerelay_core::config::Config;
use voicerelay_gateway::{Gateway, GatewayState, ServerMessage};
use voicerelay_upstream::UpstreamSettings;
use voicerelay_webrtc::{
    IceCandidate, PeerConnection, PeerConnector, PeerError, PeerEventSender, SessionDescription,
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct CannedPeer;

#[async_trait]
impl PeerConnection for CannedPeer {
    async fn set_remote_description(&self, _d: SessionDescription) -> Result<(), PeerError> {
        Ok(())
    }

    async fn set_local_description(&self, _d: SessionDescription) -> Result<(), PeerError> {
        Ok(())
    }

    async fn create_answer(&self) -> Result<SessionDescription, PeerError> {
        Ok(SessionDescription::answer("v=0 gateway-answer"))
    }

    async fn create_offer(&self, _ice_restart: bool) -> Result<SessionDescription, PeerError> {
        Ok(SessionDescription::offer("v=0 gateway-offer"))
    }

    async fn add_ice_candidate(&self, _c: IceCandidate) -> Result<(), PeerError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), PeerError> {
        Ok(())
    }
}

struct CannedConnector;

#[async_trait]
impl PeerConnector for CannedConnector {
    async fn connect(&self, _events: PeerEventSender) -> Result<Box<dyn PeerConnection>, PeerError> {
        Ok(Box::new(CannedPeer))
    }
}

/// Realtime service stand-in: records frames and answers audio with a delta.
async fn realtime_service() -> (String, mpsc::UnboundedReceiver<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let seen_tx = seen_tx.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await else {
                    return;
                };
                while let Some(Ok(msg)) = ws.next().await {
                    let Message::Text(text) = msg else { continue };
                    let frame: Value = serde_json::from_str(&text).unwrap();
                    if frame["type"] == "input_audio_buffer.append" {
                        let delta = json!({
                            "type": "response.audio.delta",
                            "response_id": "r1",
                            "item_id": "i1",
                            "delta": frame["audio"],
                        });
                        let _ = ws.send(Message::Text(delta.to_string())).await;
                    }
                    let _ = seen_tx.send(frame);
                }
            });
        }
    });

    (format!("ws://{}/v1/realtime", addr), seen)
}

async fn spawn_gateway(config: Config, upstream_url: &str) -> (SocketAddr, Arc<GatewayState>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let settings =
        UpstreamSettings::new(upstream_url, "gpt-test").with_connect_timeout(Duration::from_secs(2));
    let gateway = Gateway::from_parts(config, settings, Arc::new(CannedConnector));
    let state = gateway.state().clone();

    tokio::spawn(async move {
        let _ = gateway.serve(listener).await;
    });

    (addr, state)
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    ws
}

async fn next_message(ws: &mut Client) -> ServerMessage {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for gateway message")
            .expect("gateway closed the socket")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn send(ws: &mut Client, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

#[tokio::test]
async fn test_full_session_over_socket() {
    let (upstream_url, mut seen) = realtime_service().await;
    let (addr, state) = spawn_gateway(Config::default(), &upstream_url).await;

    let mut ws = connect(addr).await;
    let session_id = match next_message(&mut ws).await {
        ServerMessage::Connected { payload } => payload.session_id,
        other => panic!("expected connected, got {:?}", other),
    };
    assert!(state.sessions.read().await.contains_key(&session_id));

    send(&mut ws, json!({"type": "start_session"})).await;
    assert_eq!(next_message(&mut ws).await, ServerMessage::SessionStarted);
    assert_eq!(seen.recv().await.unwrap()["type"], "session.update");

    send(
        &mut ws,
        json!({"type": "webrtc_offer", "payload": {"type": "offer", "sdp": "v=0 browser"}}),
    )
    .await;
    assert_eq!(
        next_message(&mut ws).await,
        ServerMessage::WebrtcAnswer {
            payload: SessionDescription::answer("v=0 gateway-answer")
        }
    );

    send(&mut ws, json!({"type": "audio_data", "payload": {"audio": "AAEC"}})).await;
    match next_message(&mut ws).await {
        ServerMessage::AudioResponse { payload } => assert_eq!(payload.audio, "AAEC"),
        other => panic!("expected audio_response, got {:?}", other),
    }
    let appended = seen.recv().await.unwrap();
    assert_eq!(appended["type"], "input_audio_buffer.append");
    assert_eq!(appended["audio"], "AAEC");

    send(&mut ws, json!({"type": "end_session"})).await;
    assert_eq!(next_message(&mut ws).await, ServerMessage::SessionEnded);

    ws.close(None).await.unwrap();
    for _ in 0..50 {
        if state.sessions.read().await.is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("session was not unregistered after close");
}

#[tokio::test]
async fn test_unknown_type_over_socket() {
    let (upstream_url, _seen) = realtime_service().await;
    let (addr, _) = spawn_gateway(Config::default(), &upstream_url).await;

    let mut ws = connect(addr).await;
    next_message(&mut ws).await;

    send(&mut ws, json!({"type": "frobnicate"})).await;
    match next_message(&mut ws).await {
        ServerMessage::Error { message, .. } => assert!(message.contains("frobnicate")),
        other => panic!("expected error, got {:?}", other),
    }

    // Still usable afterwards.
    send(&mut ws, json!({"type": "webrtc_restart_ice"})).await;
    assert_eq!(
        next_message(&mut ws).await,
        ServerMessage::WebrtcOffer {
            payload: SessionDescription::offer("v=0 gateway-offer")
        }
    );
}

#[tokio::test]
async fn test_health_reports_sessions() {
    let (upstream_url, _seen) = realtime_service().await;
    let (addr, _) = spawn_gateway(Config::default(), &upstream_url).await;

    let health: Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["sessions"], 0);

    let mut ws = connect(addr).await;
    next_message(&mut ws).await;

    let health: Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["sessions"], 1);
}

#[tokio::test]
async fn test_connection_limit_rejects_upgrade() {
    let (upstream_url, _seen) = realtime_service().await;
    let mut config = Config::default();
    config.gateway.max_connections = 1;
    let (addr, _) = spawn_gateway(config, &upstream_url).await;

    let mut first = connect(addr).await;
    next_message(&mut first).await;

    match connect_async(format!("ws://{}/ws", addr)).await {
        Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 503),
        Err(other) => panic!("expected HTTP 503, got {:?}", other),
        Ok(_) => panic!("second connection should be rejected"),
    }
}

#[tokio::test]
async fn test_disconnect_without_end_tears_down_upstream() {
    let (upstream_url, mut seen) = realtime_service().await;
    let (addr, state) = spawn_gateway(Config::default(), &upstream_url).await;

    let mut ws = connect(addr).await;
    next_message(&mut ws).await;
    send(&mut ws, json!({"type": "start_session"})).await;
    assert_eq!(next_message(&mut ws).await, ServerMessage::SessionStarted);
    assert_eq!(seen.recv().await.unwrap()["type"], "session.update");

    drop(ws);

    for _ in 0..50 {
        if state.sessions.read().await.is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("session was not unregistered after disconnect");
}
