//! WebSocket gateway for voicerelay.
//!
//! This crate provides:
//! - The browser-facing message envelope
//! - [`ConnectionSession`], routing one client's messages to its upstream
//!   session and peer negotiation
//! - The workflow webhook collaborator
//! - The axum server that owns one session per socket

pub mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod webhook;

pub use error::GatewayError;
pub use protocol::{ClientEnvelope, ServerMessage};
pub use server::{Gateway, GatewayState};
pub use session::{ConnectionSession, LifecycleState};
pub use webhook::WebhookClient;

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
