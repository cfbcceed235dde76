//! Upstream session client.
//!
//! Owns at most one WebSocket connection to the realtime service. The
//! connection is opened by [`UpstreamSessionClient::start`], fed audio by
//! [`UpstreamSessionClient::send_audio_frame`], drained through
//! [`UpstreamSessionClient::next_event`] and closed by
//! [`UpstreamSessionClient::end`].

use crate::error::UpstreamError;
use crate::event::{self, RelayEvent};
use crate::protocol::{ClientEvent, SessionConfig};
use crate::Result;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;
use voicerelay_core::config::Config;
use voicerelay_core::SecretString;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection settings for the realtime service.
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    /// WebSocket endpoint, without the model query parameter.
    pub url: String,

    /// Model name.
    pub model: String,

    /// API key sent as a bearer token. Omitted when `None`.
    pub api_key: Option<SecretString>,

    /// Bound on the open handshake.
    pub connect_timeout: Duration,

    /// Optional system instructions.
    pub instructions: Option<String>,
}

impl UpstreamSettings {
    /// Build settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: config.upstream.url.clone(),
            model: config.upstream.model.clone(),
            api_key: config.upstream_api_key(),
            connect_timeout: Duration::from_secs(config.upstream.connect_timeout_secs),
            instructions: config.upstream.instructions.clone(),
        }
    }

    /// Settings for an unauthenticated endpoint, mainly for local services.
    pub fn new(url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            model: model.into(),
            api_key: None,
            connect_timeout: Duration::from_secs(10),
            instructions: None,
        }
    }

    /// Set the handshake timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<SecretString>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Endpoint URL including the `model` query parameter.
    pub fn endpoint(&self) -> Result<Url> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| UpstreamError::unavailable(format!("invalid url '{}': {}", self.url, e)))?;
        url.query_pairs_mut().append_pair("model", &self.model);
        Ok(url)
    }
}

/// Result of [`UpstreamSessionClient::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new connection was opened and configured.
    Opened,

    /// A connection was already live; nothing changed.
    AlreadyConnected,
}

/// Client for one upstream realtime session.
pub struct UpstreamSessionClient {
    settings: UpstreamSettings,
    sink: Option<SplitSink<WsStream, Message>>,
    stream: Option<SplitStream<WsStream>>,
}

impl std::fmt::Debug for UpstreamSessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamSessionClient")
            .field("url", &self.settings.url)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl UpstreamSessionClient {
    /// Create a disconnected client.
    pub fn new(settings: UpstreamSettings) -> Self {
        Self {
            settings,
            sink: None,
            stream: None,
        }
    }

    /// Whether an upstream connection is live.
    pub fn is_connected(&self) -> bool {
        self.sink.is_some()
    }

    /// Open the connection and send the session configuration.
    ///
    /// A second call while connected is a no-op. The handshake is bounded by
    /// the configured timeout and never retried here.
    pub async fn start(&mut self) -> Result<StartOutcome> {
        if self.is_connected() {
            info!("Upstream session already connected, ignoring redundant start");
            return Ok(StartOutcome::AlreadyConnected);
        }

        let endpoint = self.settings.endpoint()?;
        let mut request = endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| UpstreamError::unavailable(e.to_string()))?;

        let headers = request.headers_mut();
        if let Some(key) = &self.settings.api_key {
            let value = HeaderValue::from_str(&key.bearer())
                .map_err(|_| UpstreamError::unavailable("API key is not a valid header value"))?;
            headers.insert("Authorization", value);
        }
        headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        debug!("Connecting to upstream at {}", self.settings.url);
        let timeout = self.settings.connect_timeout;
        let (ws, _response) = match tokio::time::timeout(timeout, connect_async(request)).await {
            Ok(Ok(connected)) => connected,
            Ok(Err(e)) => return Err(UpstreamError::unavailable(e.to_string())),
            Err(_) => return Err(UpstreamError::Timeout(timeout)),
        };

        let (mut sink, stream) = ws.split();

        let update = ClientEvent::SessionUpdate {
            session: SessionConfig::fixed(self.settings.instructions.clone()),
        };
        let text = serde_json::to_string(&update)?;
        if let Err(e) = sink.send(Message::Text(text)).await {
            return Err(UpstreamError::unavailable(format!(
                "failed to send session configuration: {}",
                e
            )));
        }

        info!("Upstream session connected");
        self.sink = Some(sink);
        self.stream = Some(stream);
        Ok(StartOutcome::Opened)
    }

    /// Forward one base64 audio chunk. Dropped with a warning when disconnected.
    pub async fn send_audio_frame(&mut self, audio: &str) {
        let Some(sink) = self.sink.as_mut() else {
            warn!("Dropping audio frame: upstream not connected");
            return;
        };

        let event = ClientEvent::InputAudioBufferAppend {
            audio: audio.to_string(),
        };
        let text = match serde_json::to_string(&event) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode {}: {}", event.event_type(), e);
                return;
            }
        };

        if let Err(e) = sink.send(Message::Text(text)).await {
            // The receive loop observes the broken connection and reports it.
            warn!("Failed to forward audio frame upstream: {}", e);
        }
    }

    /// Close the connection. Safe to call repeatedly or before `start`.
    pub async fn end(&mut self) {
        self.stream = None;
        let Some(mut sink) = self.sink.take() else {
            return;
        };

        if let Err(e) = sink.send(Message::Close(None)).await {
            debug!("Upstream close frame not sent: {}", e);
        }
        if let Err(e) = sink.close().await {
            debug!("Upstream sink close failed: {}", e);
        }
        info!("Upstream session closed");
    }

    /// Wait for the next relay event.
    ///
    /// Never resolves while disconnected. Returns `None` once when the live
    /// connection closes; the client is disconnected afterwards. Malformed
    /// events are logged and skipped. Cancel-safe.
    pub async fn next_event(&mut self) -> Option<RelayEvent> {
        let Some(stream) = self.stream.as_mut() else {
            return std::future::pending().await;
        };

        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => match event::translate(&text) {
                    Ok(Some(event)) => return Some(event),
                    Ok(None) => continue,
                    Err(e) => {
                        warn!("{}; event ignored", e);
                        continue;
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    info!("Upstream closed the connection: {:?}", frame);
                    break;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!("Upstream connection error: {}", e);
                    break;
                }
                None => break,
            }
        }

        self.stream = None;
        self.sink = None;
        None
    }
}
