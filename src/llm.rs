//! Language model boundary.
//!
//! The model is a stateless text-completion service: the agent loop
//! re-sends the full prompt (instructions + question + scratchpad) every
//! round. [`CompletionModel`] is the seam the agent is generic over, so
//! tests can drive the loop with a scripted model instead of a network
//! backend.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::LlmConfig;

/// A stateless prompt-in, text-out completion backend.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Model identifier for logging and diagnostics.
    fn model_name(&self) -> &str;

    /// Complete the prompt. Transport or backend failures are errors;
    /// malformed-but-delivered text is not (the agent's parser owns that).
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Instantiate the completion backend named in the configuration.
pub fn create_model(config: &LlmConfig) -> Result<Box<dyn CompletionModel>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAIChatModel::new(config)?)),
        "disabled" => bail!("LLM provider is disabled. Set [llm] provider in config."),
        other => bail!("Unknown llm provider: {}", other),
    }
}

/// OpenAI-compatible chat completion backend.
///
/// Sends the prompt as a single user message with temperature 0 and stops
/// generation at `"Observation:"` so the model cannot hallucinate tool
/// output — the loop supplies the real observation next round.
pub struct OpenAIChatModel {
    model: String,
    base_url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIChatModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("llm.model required for OpenAI provider"))?;

        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl CompletionModel for OpenAIChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let url = format!("{}/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0,
            "stop": ["Observation:"],
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::warn!(
                    attempt,
                    delay_secs = delay.as_secs(),
                    "retrying completion request"
                );
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_completion_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "Completion API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Completion API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Completion failed after retries")))
    }
}

fn parse_completion_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .map(|t| t.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid completion response: missing choices[0].message.content"))
}
