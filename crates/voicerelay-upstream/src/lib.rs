//! Session client for the realtime speech service.
//!
//! This crate provides:
//! - The upstream wire protocol (session configuration, audio append, server events)
//! - [`RelayEvent`], the closed vocabulary the relay forwards to browser clients
//! - [`UpstreamSessionClient`], owning at most one live upstream connection

pub mod client;
pub mod error;
pub mod event;
pub mod protocol;

pub use client::{StartOutcome, UpstreamSessionClient, UpstreamSettings};
pub use error::UpstreamError;
pub use event::RelayEvent;

/// Result type for upstream operations.
pub type Result<T> = std::result::Result<T, UpstreamError>;
