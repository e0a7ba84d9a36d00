//! Generative-model abstraction and the OpenAI chat implementation.
//!
//! The model is asked for a JSON-only response but compliance is not
//! guaranteed; callers treat the returned text as untrusted input and
//! validate its shape themselves (see [`crate::agents`]). Generation
//! calls are not retried here — retry policy is a host concern.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::GenerationConfig;

/// Capability interface: (system prompt, user prompt) → raw response
/// text, requested as a JSON object.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-5"`).
    fn model_name(&self) -> &str;

    /// Run one chat completion in JSON mode and return the raw message
    /// content. An empty or non-JSON reply is returned as-is for the
    /// caller to reject.
    async fn complete_json(&self, system: &str, user: &str) -> Result<String>;
}

/// Chat-completions backend using the OpenAI API with
/// `response_format: json_object`.
pub struct OpenAiModel {
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl OpenAiModel {
    /// Requires `OPENAI_API_KEY`; its absence is a construction-time
    /// error so the missing credential surfaces before any work is done.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        Ok(Self {
            api_key,
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl GenerativeModel for OpenAiModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete_json(&self, system: &str, user: &str) -> Result<String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "response_format": {"type": "json_object"},
        });

        let response = client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let content = json
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .unwrap_or_default();

        Ok(content.to_string())
    }
}
