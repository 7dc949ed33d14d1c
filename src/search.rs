//! Direct similarity search from the CLI.
//!
//! Debugging aid: runs the same embed-and-rank path the retriever tool
//! uses, but prints the scored chunks instead of handing them to an agent.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::index;

pub async fn run_search(config: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    if !config.embedding.is_enabled() {
        anyhow::bail!("Search requires embeddings. Set [embedding] provider in config.");
    }

    let pool = db::connect(config).await?;
    let k = limit.unwrap_or(config.retrieval.top_k);

    let provider = embedding::create_provider(&config.embedding)?;
    index::verify_model_pin(&pool, provider.model_name()).await?;

    let query_vec = embedding::embed_query(provider.as_ref(), &config.embedding, query).await?;
    let results = index::query_top_k(&pool, &query_vec, k).await?;

    if results.is_empty() {
        println!("No results.");
        pool.close().await;
        return Ok(());
    }

    for (i, hit) in results.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} @ char {}",
            i + 1,
            hit.score,
            hit.document_id,
            hit.start_offset
        );
        println!(
            "    excerpt: \"{}\"",
            snippet(&hit.text, 160).replace('\n', " ")
        );
        println!();
    }

    pool.close().await;
    Ok(())
}

fn snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    }
}
