//! Workflow webhook collaborator.
//!
//! `trigger_n8n` payloads are POSTed as `{source, timestamp, data}`. The
//! response body is returned as JSON, or wrapped as `{text}` when it is not
//! JSON.

use crate::error::GatewayError;
use crate::Result;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use voicerelay_core::config::Config;

#[derive(Debug, Serialize)]
struct WebhookEnvelope<'a> {
    source: &'a str,
    timestamp: String,
    data: &'a Value,
}

/// Client for the configured workflow webhook.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    http: reqwest::Client,
    url: Option<String>,
    source: String,
    timeout: Duration,
}

impl WebhookClient {
    pub fn new(url: Option<String>, source: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            source: source.into(),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.webhook_url(),
            config.webhook.source.clone(),
            Duration::from_secs(config.webhook.timeout_secs),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    /// POST `data` to the webhook and return the response body.
    pub async fn trigger(&self, data: &Value) -> Result<Value> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| GatewayError::Webhook("no webhook URL configured".to_string()))?;

        let envelope = WebhookEnvelope {
            source: &self.source,
            timestamp: chrono::Utc::now().to_rfc3339(),
            data,
        };

        debug!("Triggering webhook {}", url);
        let response = self
            .http
            .post(url)
            .timeout(self.timeout)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Webhook(format!("timed out after {:?}", self.timeout))
                } else {
                    GatewayError::Webhook(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Webhook(format!("webhook returned {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Webhook(e.to_string()))?;
        Ok(serde_json::from_str(&body).unwrap_or_else(|_| json!({ "text": body })))
    }
}
