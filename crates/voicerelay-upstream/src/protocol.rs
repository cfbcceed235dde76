//! Realtime service wire format.
//!
//! Outbound control messages are [`ClientEvent`]s. Inbound frames are decoded
//! into [`ServerEvent`]; tags the relay does not understand decode to
//! [`ServerEvent::Other`] instead of failing.

use serde::{Deserialize, Serialize};

/// Voice preset used for spoken responses.
pub const VOICE: &str = "alloy";

/// Input and output audio format (16-bit PCM).
pub const AUDIO_FORMAT: &str = "pcm16";

/// Model used to transcribe the caller's audio.
pub const TRANSCRIPTION_MODEL: &str = "whisper-1";

/// Server VAD activation threshold.
pub const VAD_THRESHOLD: f64 = 0.5;

/// Audio kept before detected speech, in milliseconds.
pub const VAD_PREFIX_PADDING_MS: u32 = 300;

/// Silence that ends a turn, in milliseconds.
pub const VAD_SILENCE_DURATION_MS: u32 = 500;

/// Sampling temperature.
pub const TEMPERATURE: f64 = 0.8;

/// Maximum tokens per response.
pub const MAX_OUTPUT_TOKENS: u32 = 4096;

/// A relay-to-service event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Configure the session. Sent once, right after the connection opens.
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    /// Append one base64 audio chunk to the input buffer.
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },
}

impl ClientEvent {
    /// Event type string, for logging without dumping audio payloads.
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::SessionUpdate { .. } => "session.update",
            Self::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
        }
    }
}

/// Session configuration carried by `session.update`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionConfig {
    pub modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub voice: String,
    pub input_audio_format: String,
    pub output_audio_format: String,
    pub input_audio_transcription: AudioTranscription,
    pub turn_detection: TurnDetection,
    pub temperature: f64,
    pub max_response_output_tokens: u32,
}

impl SessionConfig {
    /// The fixed relay session configuration.
    pub fn fixed(instructions: Option<String>) -> Self {
        Self {
            modalities: vec!["text".to_string(), "audio".to_string()],
            instructions,
            voice: VOICE.to_string(),
            input_audio_format: AUDIO_FORMAT.to_string(),
            output_audio_format: AUDIO_FORMAT.to_string(),
            input_audio_transcription: AudioTranscription {
                model: TRANSCRIPTION_MODEL.to_string(),
            },
            turn_detection: TurnDetection::server_vad(),
            temperature: TEMPERATURE,
            max_response_output_tokens: MAX_OUTPUT_TOKENS,
        }
    }
}

/// Input transcription settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioTranscription {
    pub model: String,
}

/// Turn detection settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
    pub threshold: f64,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

impl TurnDetection {
    /// Server-driven voice activity detection with the relay's fixed parameters.
    pub fn server_vad() -> Self {
        Self {
            kind: "server_vad".to_string(),
            threshold: VAD_THRESHOLD,
            prefix_padding_ms: VAD_PREFIX_PADDING_MS,
            silence_duration_ms: VAD_SILENCE_DURATION_MS,
        }
    }
}

/// A service-to-relay event.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "session.created")]
    SessionCreated {
        #[serde(default)]
        session: serde_json::Value,
    },

    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        #[serde(default)]
        item_id: Option<String>,
    },

    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        #[serde(default)]
        item_id: Option<String>,
    },

    /// Base64 PCM chunk of the spoken response.
    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        delta: String,
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        item_id: Option<String>,
    },

    #[serde(rename = "response.text.delta")]
    TextDelta {
        delta: String,
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        item_id: Option<String>,
    },

    /// Transcript of the spoken response.
    #[serde(rename = "response.audio_transcript.delta")]
    AudioTranscriptDelta {
        delta: String,
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        item_id: Option<String>,
    },

    #[serde(rename = "response.done")]
    ResponseDone {
        #[serde(default)]
        response: serde_json::Value,
    },

    #[serde(rename = "error")]
    Error { error: ErrorDetail },

    #[serde(other)]
    Other,
}

/// Error payload of an upstream `error` event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorDetail {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}
