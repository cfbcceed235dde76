//! Configuration loading and persistence.

use super::Config;
use crate::env::{self, vars};
use crate::error::ConfigError;
use crate::secret::SecretString;
use std::fs;
use std::path::Path;

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::Json5(e.to_string()))
    }

    /// Save configuration to a file path.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_json5()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Serialize to a JSON5-compatible string.
    pub fn to_json5(&self) -> Result<String, ConfigError> {
        // json5 has no serializer; pretty JSON is valid JSON5.
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate the configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.gateway.port == 0 {
            errors.push("Gateway port cannot be 0".to_string());
        }
        if self.gateway.max_connections == 0 {
            errors.push("Gateway max_connections must be greater than 0".to_string());
        }

        if !(self.upstream.url.starts_with("ws://") || self.upstream.url.starts_with("wss://")) {
            errors.push(format!(
                "Upstream url '{}' must use ws:// or wss://",
                self.upstream.url
            ));
        }
        if self.upstream.model.trim().is_empty() {
            errors.push("Upstream model must not be empty".to_string());
        }
        if self.upstream.connect_timeout_secs == 0 {
            errors.push("Upstream connect_timeout_secs must be greater than 0".to_string());
        }

        for server in &self.webrtc.ice_servers {
            let known = ["stun:", "turn:", "turns:"]
                .iter()
                .any(|scheme| server.starts_with(scheme));
            if !known {
                errors.push(format!(
                    "ICE server '{}' must start with stun:, turn: or turns:",
                    server
                ));
            }
        }

        if let Some(url) = &self.webhook.url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(format!("Webhook url '{}' must use http:// or https://", url));
            }
        }
        if self.webhook.timeout_secs == 0 {
            errors.push("Webhook timeout_secs must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }

    /// Load configuration from `path`, falling back to defaults if it does not exist.
    pub fn load_or_default_from(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(ConfigError::NotFound(_)) => Self::from_env_defaults(),
            Err(e) => {
                tracing::warn!("Ignoring unreadable config file: {}", e);
                Self::from_env_defaults()
            }
        }
    }

    /// Create a Config from defaults, enhanced by environment variable detection.
    pub fn from_env_defaults() -> Self {
        let mut config = Self::default();

        config.upstream.api_key = SecretString::from_env(vars::OPENAI_API_KEY);
        config.webhook.url = env::get_var(vars::N8N_WEBHOOK_URL);

        if let Some(port) = env::get_u16(vars::VOICERELAY_PORT) {
            config.gateway.port = port;
        }

        config
    }

    /// API key from the config file, else from `OPENAI_API_KEY`.
    pub fn upstream_api_key(&self) -> Option<SecretString> {
        self.upstream
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| SecretString::from_env(vars::OPENAI_API_KEY))
    }

    /// Webhook URL from the config file, else from `N8N_WEBHOOK_URL`.
    pub fn webhook_url(&self) -> Option<String> {
        self.webhook
            .url
            .clone()
            .or_else(|| env::get_var(vars::N8N_WEBHOOK_URL))
    }
}
