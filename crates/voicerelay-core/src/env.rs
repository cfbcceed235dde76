//! Environment variable handling.

use std::env;

/// Get an environment variable, returning None if not set or empty.
pub fn get_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable as a u16 (e.g., for ports).
pub fn get_u16(name: &str) -> Option<u16> {
    get_var(name).and_then(|v| v.parse().ok())
}

/// Environment variable names read by voicerelay.
pub mod vars {
    /// API key for the realtime speech service.
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

    /// Workflow webhook endpoint.
    pub const N8N_WEBHOOK_URL: &str = "N8N_WEBHOOK_URL";

    /// Gateway port override.
    pub const VOICERELAY_PORT: &str = "VOICERELAY_PORT";

    /// Config file override.
    pub const VOICERELAY_CONFIG: &str = "VOICERELAY_CONFIG";

    /// Home directory override.
    pub const VOICERELAY_HOME: &str = "VOICERELAY_HOME";
}
