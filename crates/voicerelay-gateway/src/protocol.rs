//! Browser-facing message protocol.
//!
//! Every frame is one JSON envelope `{type, payload?, message?}`.

use crate::error::GatewayError;
use crate::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use voicerelay_upstream::RelayEvent;
use voicerelay_webrtc::{IceCandidate, SessionDescription};

/// Inbound message types.
pub mod kinds {
    pub const START_SESSION: &str = "start_session";
    pub const END_SESSION: &str = "end_session";
    pub const AUDIO_DATA: &str = "audio_data";
    pub const WEBRTC_OFFER: &str = "webrtc_offer";
    pub const WEBRTC_ANSWER: &str = "webrtc_answer";
    pub const WEBRTC_ICE_CANDIDATE: &str = "webrtc_ice_candidate";
    pub const WEBRTC_RESTART_ICE: &str = "webrtc_restart_ice";
    pub const TRIGGER_N8N: &str = "trigger_n8n";
}

/// An inbound client message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ClientEnvelope {
    /// Parse one text frame.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| GatewayError::malformed(e.to_string()))
    }

    /// Decode the payload into `T`. A missing payload is malformed.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        let payload = self
            .payload
            .clone()
            .ok_or_else(|| GatewayError::malformed(format!("{} requires a payload", self.kind)))?;
        serde_json::from_value(payload)
            .map_err(|e| GatewayError::malformed(format!("invalid {} payload: {}", self.kind, e)))
    }

    /// Audio chunk of an `audio_data` message.
    ///
    /// Accepts either a bare base64 string or `{audio: "<base64>"}`.
    pub fn audio(&self) -> Result<String> {
        match &self.payload {
            Some(Value::String(audio)) => Ok(audio.clone()),
            Some(Value::Object(map)) => match map.get("audio") {
                Some(Value::String(audio)) => Ok(audio.clone()),
                _ => Err(GatewayError::malformed("audio_data payload has no audio string")),
            },
            _ => Err(GatewayError::malformed("audio_data requires a payload")),
        }
    }
}

/// `connected` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedPayload {
    pub session_id: String,
}

/// `audio_response` payload. `audio` is the upstream base64 chunk, untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioPayload {
    pub audio: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
}

/// `text_response` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPayload {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
}

/// `n8n_response` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub data: Value,
}

/// An outbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected { payload: ConnectedPayload },
    SessionStarted,
    SessionEnded,
    SpeechStarted,
    SpeechStopped,
    AudioResponse { payload: AudioPayload },
    TextResponse { payload: TextPayload },
    ResponseComplete,
    WebrtcOffer { payload: SessionDescription },
    WebrtcAnswer { payload: SessionDescription },
    WebrtcIceCandidate { payload: IceCandidate },
    #[serde(rename = "n8n_response")]
    N8nResponse { payload: WebhookPayload },
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl ServerMessage {
    pub fn connected(session_id: impl Into<String>) -> Self {
        Self::Connected {
            payload: ConnectedPayload {
                session_id: session_id.into(),
            },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            code: None,
        }
    }

    /// Message type, for logging without dumping payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::SessionStarted => "session_started",
            Self::SessionEnded => "session_ended",
            Self::SpeechStarted => "speech_started",
            Self::SpeechStopped => "speech_stopped",
            Self::AudioResponse { .. } => "audio_response",
            Self::TextResponse { .. } => "text_response",
            Self::ResponseComplete => "response_complete",
            Self::WebrtcOffer { .. } => "webrtc_offer",
            Self::WebrtcAnswer { .. } => "webrtc_answer",
            Self::WebrtcIceCandidate { .. } => "webrtc_ice_candidate",
            Self::N8nResponse { .. } => "n8n_response",
            Self::Error { .. } => "error",
        }
    }

    /// Encode as one text frame.
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<&GatewayError> for ServerMessage {
    fn from(err: &GatewayError) -> Self {
        Self::error(err.to_string())
    }
}

impl From<RelayEvent> for ServerMessage {
    fn from(event: RelayEvent) -> Self {
        match event {
            RelayEvent::SpeechStarted => Self::SpeechStarted,
            RelayEvent::SpeechStopped => Self::SpeechStopped,
            RelayEvent::AudioDelta {
                audio,
                response_id,
                item_id,
            } => Self::AudioResponse {
                payload: AudioPayload {
                    audio,
                    response_id,
                    item_id,
                },
            },
            RelayEvent::TextDelta {
                text,
                response_id,
                item_id,
            } => Self::TextResponse {
                payload: TextPayload {
                    text,
                    response_id,
                    item_id,
                },
            },
            RelayEvent::ResponseComplete => Self::ResponseComplete,
            RelayEvent::UpstreamError { code, message } => Self::Error { message, code },
        }
    }
}
