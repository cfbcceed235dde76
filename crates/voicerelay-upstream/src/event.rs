//! Translation of upstream events into relay events.

use crate::error::UpstreamError;
use crate::protocol::ServerEvent;
use crate::Result;
use tracing::{debug, info};

/// Normalized upstream event, forwarded to the browser client as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// Server VAD detected the caller started speaking.
    SpeechStarted,

    /// Server VAD detected the caller stopped speaking.
    SpeechStopped,

    /// A chunk of response audio, still base64-encoded.
    AudioDelta {
        audio: String,
        response_id: Option<String>,
        item_id: Option<String>,
    },

    /// A chunk of response text.
    TextDelta {
        text: String,
        response_id: Option<String>,
        item_id: Option<String>,
    },

    /// The current response finished.
    ResponseComplete,

    /// The service reported an error. The connection stays open.
    UpstreamError {
        code: Option<String>,
        message: String,
    },
}

impl RelayEvent {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SpeechStarted => "speech_started",
            Self::SpeechStopped => "speech_stopped",
            Self::AudioDelta { .. } => "audio_delta",
            Self::TextDelta { .. } => "text_delta",
            Self::ResponseComplete => "response_complete",
            Self::UpstreamError { .. } => "upstream_error",
        }
    }
}

/// Translate one inbound text frame into zero or one relay event.
///
/// Frames that are not JSON, or that carry a known tag with missing fields,
/// yield [`UpstreamError::Protocol`]. Unknown tags yield `Ok(None)`.
pub fn translate(frame: &str) -> Result<Option<RelayEvent>> {
    let event: ServerEvent = serde_json::from_str(frame)
        .map_err(|e| UpstreamError::protocol(format!("undecodable event: {}", e)))?;
    Ok(from_server_event(event))
}

fn from_server_event(event: ServerEvent) -> Option<RelayEvent> {
    match event {
        ServerEvent::SessionCreated { session } => {
            let id = session.get("id").and_then(|v| v.as_str()).unwrap_or("?");
            info!("Upstream session created: {}", id);
            None
        }
        ServerEvent::SpeechStarted { .. } => Some(RelayEvent::SpeechStarted),
        ServerEvent::SpeechStopped { .. } => Some(RelayEvent::SpeechStopped),
        ServerEvent::AudioDelta {
            delta,
            response_id,
            item_id,
        } => Some(RelayEvent::AudioDelta {
            audio: delta,
            response_id,
            item_id,
        }),
        ServerEvent::TextDelta {
            delta,
            response_id,
            item_id,
        }
        | ServerEvent::AudioTranscriptDelta {
            delta,
            response_id,
            item_id,
        } => Some(RelayEvent::TextDelta {
            text: delta,
            response_id,
            item_id,
        }),
        ServerEvent::ResponseDone { .. } => Some(RelayEvent::ResponseComplete),
        ServerEvent::Error { error } => Some(RelayEvent::UpstreamError {
            code: error.code.or(error.kind),
            message: error.message,
        }),
        ServerEvent::Other => {
            debug!("Ignoring upstream event");
            None
        }
    }
}
