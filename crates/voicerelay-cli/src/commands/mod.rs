//! CLI command implementations.

pub mod client;
pub mod config;
pub mod gateway;
