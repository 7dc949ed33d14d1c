//! Agent-facing tools.
//!
//! A [`Tool`] is a named capability that takes a free-text input and
//! returns text. Tools are collected in an explicit [`ToolRegistry`]
//! constructed once and handed to the agent loop; the loop is polymorphic
//! over anything implementing the trait, so new tools need no loop
//! changes. The tool's description is part of the contract surface — it is
//! what the language model reads when deciding whether to call it.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::embedding::{ConfiguredEmbedder, QueryEmbedder};
use crate::index;

/// Returned by the retriever when nothing matched. A retrieval miss is a
/// normal observation, never an error.
pub const NO_RESULTS_MESSAGE: &str =
    "No relevant information was found in the indexed corpus for that query.";

/// Separator between retrieved chunk texts, so the model can tell where
/// one passage ends and the next begins.
pub const CHUNK_SEPARATOR: &str = "\n\n---\n\n";

/// A named, described capability the agent can invoke with a text input.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Exact name the model must write on its `Action:` line.
    fn name(&self) -> &str;

    /// One-paragraph natural-language description for the model.
    fn description(&self) -> &str;

    /// Run the tool. The returned text becomes the observation.
    async fn call(&self, input: &str) -> Result<String>;
}

/// Explicit name → tool mapping handed to the agent loop.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    /// Exact-string lookup; the agent loop treats a miss as a parse error.
    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Built-in semantic retrieval tool.
///
/// Embeds the query with the same provider used at ingestion time
/// (verified via the model pin in `index_meta`), runs a top-k cosine
/// search over the persisted index, and returns the chunk texts joined by
/// [`CHUNK_SEPARATOR`] in descending-similarity order.
pub struct RetrieverTool {
    pool: SqlitePool,
    name: String,
    description: String,
    top_k: usize,
    embedder: Box<dyn QueryEmbedder>,
}

impl RetrieverTool {
    pub fn new(config: &Config, pool: SqlitePool) -> Self {
        Self::with_embedder(
            config,
            pool,
            Box::new(ConfiguredEmbedder::new(config.embedding.clone())),
        )
    }

    /// Like [`new`](Self::new), but with an explicit query embedder.
    pub fn with_embedder(
        config: &Config,
        pool: SqlitePool,
        embedder: Box<dyn QueryEmbedder>,
    ) -> Self {
        Self {
            pool,
            name: config.retrieval.tool_name.clone(),
            description: config.retrieval.tool_description.clone(),
            top_k: config.retrieval.top_k,
            embedder,
        }
    }
}

#[async_trait]
impl Tool for RetrieverTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn call(&self, input: &str) -> Result<String> {
        let query = input.trim();
        if query.is_empty() {
            return Ok(NO_RESULTS_MESSAGE.to_string());
        }

        index::verify_model_pin(&self.pool, self.embedder.model_name()).await?;

        let query_vec = self.embedder.embed(query).await?;
        let hits = index::query_top_k(&self.pool, &query_vec, self.top_k).await?;

        if hits.is_empty() {
            return Ok(NO_RESULTS_MESSAGE.to_string());
        }

        tracing::debug!(query, hits = hits.len(), "retriever returned chunks");

        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        Ok(texts.join(CHUNK_SEPARATOR))
    }
}
