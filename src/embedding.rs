//! Embedding model boundary.
//!
//! The embedding model is a black box: text in, fixed-length `Vec<f32>`
//! out. This module defines the [`EmbeddingProvider`] trait plus two
//! implementations:
//!
//! - [`DisabledProvider`] — every embed attempt fails; the default when no
//!   provider is configured.
//! - [`OpenAIProvider`] — calls an OpenAI-compatible `/embeddings` endpoint
//!   with batching and exponential-backoff retry.
//!
//! It also holds the vector plumbing shared by the indexer and retriever:
//! [`vec_to_blob`] / [`blob_to_vec`] for SQLite BLOB storage and
//! [`cosine_similarity`] for ranking.
//!
//! The same configured provider must be used at ingestion time and query
//! time; the index records the model name so a mismatch is detected rather
//! than silently producing garbage rankings.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Metadata interface for embedding backends. The embedding call itself is
/// the free function [`embed_texts`] (async trait methods stay off the
/// trait to keep it object safe without boxing futures).
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier, e.g. `"text-embedding-3-small"`.
    fn model_name(&self) -> &str;
    /// Embedding dimensionality, e.g. `1536`.
    fn dims(&self) -> usize;
}

/// A provider that refuses to embed. Used when `[embedding].provider`
/// is `"disabled"`.
pub struct DisabledProvider;

impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
}

/// OpenAI-compatible embedding backend. Needs `OPENAI_API_KEY` in the
/// environment; the endpoint host comes from `[embedding].base_url` so
/// self-hosted OpenAI-compatible servers work too.
pub struct OpenAIProvider {
    model: String,
    dims: usize,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for OpenAI provider"))?;

        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }

        Ok(Self { model, dims })
    }
}

impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

/// Instantiate the provider named in the configuration.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "openai" => Ok(Box::new(OpenAIProvider::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Embed a batch of texts, one vector per input, in input order.
///
/// Dispatches on the config's `provider` field. The `"disabled"` provider
/// always errors; this is a configuration problem, not a retrieval miss.
pub async fn embed_texts(
    _provider: &dyn EmbeddingProvider,
    config: &EmbeddingConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    match config.provider.as_str() {
        "openai" => embed_openai(config, texts).await,
        "disabled" => bail!("Embedding provider is disabled"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Embed a single query string. Convenience wrapper for the retriever.
pub async fn embed_query(
    provider: &dyn EmbeddingProvider,
    config: &EmbeddingConfig,
    text: &str,
) -> Result<Vec<f32>> {
    let results = embed_texts(provider, config, &[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
}

/// Query-time embedding seam. The retriever is generic over this trait so
/// tests can drive its query path with hand-built vectors instead of a
/// network backend.
#[async_trait]
pub trait QueryEmbedder: Send + Sync {
    /// Model identifier, compared against the index's model pin.
    fn model_name(&self) -> &str;

    /// Embed one query string.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embeds queries with the provider named in the configuration.
pub struct ConfiguredEmbedder {
    config: EmbeddingConfig,
}

impl ConfiguredEmbedder {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl QueryEmbedder for ConfiguredEmbedder {
    fn model_name(&self) -> &str {
        self.config.model.as_deref().unwrap_or("disabled")
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let provider = create_provider(&self.config)?;
        embed_query(provider.as_ref(), &self.config, text).await
    }
}

/// Call the embeddings endpoint with retry.
///
/// 429 and 5xx responses and network errors retry with exponential backoff
/// (1s, 2s, 4s, ... capped at 32s); any other 4xx fails immediately.
async fn embed_openai(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let api_key =
        std::env::var("OPENAI_API_KEY").map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

    let model = config
        .model
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("embedding.model required"))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let url = format!("{}/embeddings", config.base_url.trim_end_matches('/'));
    let body = serde_json::json!({
        "model": model,
        "input": texts,
    });

    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::warn!(attempt, delay_secs = delay.as_secs(), "retrying embedding request");
            tokio::time::sleep(delay).await;
        }

        let resp = client
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
                    return parse_embedding_response(&json);
                }

                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow::anyhow!(
                        "Embedding API error {}: {}",
                        status,
                        body_text
                    ));
                    continue;
                }

                let body_text = response.text().await.unwrap_or_default();
                bail!("Embedding API error {}: {}", status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Embedding failed after retries")))
}

fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid embedding response: missing data array"))?;

    let mut embeddings = Vec::with_capacity(data.len());

    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid embedding response: missing embedding"))?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        embeddings.push(vec);
    }

    Ok(embeddings)
}

/// Encode a float vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`] back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`. Returns `0.0` for empty or
/// mismatched-length inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
