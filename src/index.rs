//! Vector index over SQLite.
//!
//! The index is rebuilt wholesale: a rebuild first deletes every stored
//! chunk and vector, then embeds and inserts the chunks of the new run.
//! This is deliberately not atomic — if embedding fails partway the old
//! index is already gone and the operator must re-run ingestion. The
//! failure is surfaced, never masked.
//!
//! Rebuilds record the embedding model name and dimensionality in
//! `index_meta`; queries verify the pin before embedding, so an index
//! built with one model is never searched with vectors from another.

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::embedding;
use crate::models::{Chunk, ScoredChunk};

pub const META_EMBEDDING_MODEL: &str = "embedding_model";
pub const META_EMBEDDING_DIMS: &str = "embedding_dims";
pub const META_CHUNK_COUNT: &str = "chunk_count";
pub const META_BUILT_AT: &str = "built_at";

/// Drop all chunks, vectors, and index metadata, then embed and insert
/// every chunk of this run. Returns the number of chunks indexed.
pub async fn rebuild(pool: &SqlitePool, config: &Config, chunks: &[Chunk]) -> Result<usize> {
    let provider = embedding::create_provider(&config.embedding)?;

    clear_index(pool).await?;
    tracing::info!(chunks = chunks.len(), "cleared index, embedding chunks");

    let mut indexed = 0usize;

    for batch in chunks.chunks(config.embedding.batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedding::embed_texts(provider.as_ref(), &config.embedding, &texts)
            .await
            .context("embedding batch failed; the index was cleared and is now incomplete — re-run ingestion")?;

        insert_batch(pool, batch, &vectors).await?;
        indexed += batch.len();
        tracing::debug!(indexed, total = chunks.len(), "indexed batch");
    }

    write_meta(pool, provider.model_name(), provider.dims(), indexed).await?;

    Ok(indexed)
}

/// Delete everything the previous ingestion run left behind.
pub async fn clear_index(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DELETE FROM chunk_vectors").execute(pool).await?;
    sqlx::query("DELETE FROM chunks").execute(pool).await?;
    sqlx::query("DELETE FROM index_meta").execute(pool).await?;
    Ok(())
}

/// Insert one batch of chunks and their vectors inside a transaction.
pub async fn insert_batch(
    pool: &SqlitePool,
    chunks: &[Chunk],
    vectors: &[Vec<f32>],
) -> Result<()> {
    anyhow::ensure!(
        chunks.len() == vectors.len(),
        "chunk/vector count mismatch: {} vs {}",
        chunks.len(),
        vectors.len()
    );

    let mut tx = pool.begin().await?;

    for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
        sqlx::query(
            r#"
            INSERT INTO chunks (id, document_id, chunk_index, start_offset, text, hash)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&chunk.id)
        .bind(&chunk.document_id)
        .bind(chunk.chunk_index)
        .bind(chunk.start_offset)
        .bind(&chunk.text)
        .bind(&chunk.hash)
        .execute(&mut *tx)
        .await?;

        let blob = embedding::vec_to_blob(vector);
        sqlx::query(
            r#"
            INSERT INTO chunk_vectors (chunk_id, document_id, dims, embedding)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&chunk.id)
        .bind(&chunk.document_id)
        .bind(vector.len() as i64)
        .bind(&blob)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Record the model pin and build stats for this index generation.
pub async fn write_meta(
    pool: &SqlitePool,
    model: &str,
    dims: usize,
    chunk_count: usize,
) -> Result<()> {
    let entries = [
        (META_EMBEDDING_MODEL, model.to_string()),
        (META_EMBEDDING_DIMS, dims.to_string()),
        (META_CHUNK_COUNT, chunk_count.to_string()),
        (META_BUILT_AT, chrono::Utc::now().to_rfc3339()),
    ];

    for (key, value) in entries {
        sqlx::query(
            "INSERT INTO index_meta (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Read one metadata value, if present.
pub async fn read_meta(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM index_meta WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

/// Fail if the index was built with a different embedding model than the
/// one currently configured. An unbuilt index (no pin) passes — the query
/// will simply find nothing.
pub async fn verify_model_pin(pool: &SqlitePool, configured_model: &str) -> Result<()> {
    if let Some(stored) = read_meta(pool, META_EMBEDDING_MODEL).await? {
        if stored != configured_model {
            anyhow::bail!(
                "index was built with embedding model '{}' but '{}' is configured; \
                 re-run ingestion or fix [embedding].model",
                stored,
                configured_model
            );
        }
    }
    Ok(())
}

/// Rank every stored vector against the query vector and return the top k
/// by cosine similarity, highest first. Ties break on chunk id so results
/// are deterministic.
pub async fn query_top_k(
    pool: &SqlitePool,
    query_vec: &[f32],
    k: usize,
) -> Result<Vec<ScoredChunk>> {
    let rows = sqlx::query(
        r#"
        SELECT cv.chunk_id, cv.embedding, c.document_id, c.start_offset, c.text
        FROM chunk_vectors cv
        JOIN chunks c ON c.id = cv.chunk_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut scored: Vec<ScoredChunk> = rows
        .iter()
        .map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            let vec = embedding::blob_to_vec(&blob);
            let score = embedding::cosine_similarity(query_vec, &vec) as f64;
            ScoredChunk {
                chunk_id: row.get("chunk_id"),
                document_id: row.get("document_id"),
                start_offset: row.get("start_offset"),
                text: row.get("text"),
                score,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    scored.truncate(k);

    Ok(scored)
}
