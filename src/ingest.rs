//! Offline ingestion pipeline.
//!
//! Orchestrates the full rebuild flow: load documents from the corpus
//! directory, split them into overlapping chunks, embed every chunk, and
//! replace the persisted vector index. The rebuild is destructive from the
//! first step (see [`crate::index::rebuild`]); a failed run leaves no
//! usable index and must be re-run.

use anyhow::{Context, Result};

use crate::chunker::split_documents;
use crate::config::Config;
use crate::corpus;
use crate::db;
use crate::index;
use crate::migrate;

pub async fn run_ingest(config: &Config, dry_run: bool) -> Result<()> {
    let documents = corpus::load_documents(config)?;
    let chunks = split_documents(
        &documents,
        config.chunking.max_chars,
        config.chunking.overlap_chars,
    );

    if dry_run {
        println!("ingest (dry-run)");
        println!("  documents found: {}", documents.len());
        println!("  chunks to index: {}", chunks.len());
        return Ok(());
    }

    if !config.embedding.is_enabled() {
        anyhow::bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let pool = db::connect(config).await?;
    migrate::create_schema(&pool).await?;

    tracing::info!(
        documents = documents.len(),
        chunks = chunks.len(),
        "starting index rebuild"
    );

    let indexed = match index::rebuild(&pool, config, &chunks).await {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!("rebuild failed; the previous index has been cleared");
            pool.close().await;
            return Err(e).context("ingestion failed");
        }
    };

    println!("ingest");
    println!("  documents: {}", documents.len());
    println!("  chunks indexed: {}", indexed);
    println!(
        "  embedding model: {}",
        config.embedding.model.as_deref().unwrap_or("?")
    );
    println!("ok");

    pool.close().await;
    Ok(())
}
