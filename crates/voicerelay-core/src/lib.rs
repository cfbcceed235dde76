//! # voicerelay-core
//!
//! Shared configuration and utilities for the voicerelay crates:
//!
//! - **Configuration**: json5 config file loading, validation and persistence
//! - **Secrets**: redacting wrapper for the upstream API key
//! - **Backoff**: the reconnect delay policy used by retrying clients
//! - **Utilities**: path resolution and environment handling

pub mod backoff;
pub mod config;
pub mod env;
pub mod error;
pub mod paths;
pub mod secret;

pub use backoff::ReconnectPolicy;
pub use config::Config;
pub use error::{ConfigError, Result};
pub use secret::SecretString;
