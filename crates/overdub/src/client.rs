//! Generative composition client.
//!
//! The orchestrator talks to the service through the [`Composer`] trait so
//! tests can substitute a scripted implementation. The production
//! implementation speaks the OpenAI-compatible chat-completions dialect.

use crate::config::Config;
use crate::{ComposeError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// One synchronous, single-shot generative call.
#[async_trait]
pub trait Composer: Send + Sync {
    /// Send a (system, user) instruction pair and return the raw response
    /// text. Network and service failures surface as
    /// [`ComposeError::ExternalService`].
    async fn generate(&self, system: &str, user: &str) -> Result<String>;
}

/// HTTP client for an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct HttpComposer {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl HttpComposer {
    /// Build a client from configuration.
    ///
    /// Fails with a configuration error when no credential is set, before
    /// any call is attempted.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.require_key()?.to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ComposeError::ExternalService(format!("failed to build client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.service_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl Composer for HttpComposer {
    async fn generate(&self, system: &str, user: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": 0.7,
            "max_tokens": 4000,
            "response_format": { "type": "json_object" },
        });

        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                ComposeError::ExternalService(format!("completion request failed: {e}"))
            })?;

        let status = resp.status();
        if !status.is_success() {
            let error_body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read error body>".to_string());
            return Err(ComposeError::ExternalService(format!(
                "completion API error {status}: {error_body}"
            )));
        }

        let resp_json: serde_json::Value = resp.json().await.map_err(|e| {
            ComposeError::ExternalService(format!("failed to parse completion response: {e}"))
        })?;

        resp_json
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ComposeError::ExternalService("no completion content in response".to_string())
            })
    }
}
