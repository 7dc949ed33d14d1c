//! Index persistence and top-k query behavior against a real SQLite file.
//!
//! Vectors are hand-built so no embedding backend is needed.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tempfile::TempDir;

use corpusqa::config::{ChunkingConfig, Config, CorpusConfig, DbConfig, ServerConfig};
use corpusqa::embedding::QueryEmbedder;
use corpusqa::index;
use corpusqa::models::Chunk;
use corpusqa::tool::{RetrieverTool, Tool, CHUNK_SEPARATOR, NO_RESULTS_MESSAGE};
use corpusqa::{db, migrate};

async fn fresh_pool(dir: &TempDir) -> SqlitePool {
    let pool = db::connect_path(&dir.path().join("index.sqlite"))
        .await
        .unwrap();
    migrate::create_schema(&pool).await.unwrap();
    pool
}

fn test_config(dir: &TempDir) -> Config {
    Config {
        corpus: CorpusConfig {
            root: dir.path().to_path_buf(),
            include_globs: vec!["**/*.txt".to_string()],
            exclude_globs: vec![],
        },
        db: DbConfig {
            path: dir.path().join("index.sqlite"),
        },
        chunking: ChunkingConfig {
            max_chars: 1000,
            overlap_chars: 100,
        },
        retrieval: Default::default(),
        embedding: Default::default(),
        llm: Default::default(),
        agent: Default::default(),
        server: ServerConfig {
            bind: "127.0.0.1:0".to_string(),
        },
    }
}

/// Embeds every query to the same hand-built vector.
struct FixedEmbedder {
    model: String,
    vector: Vec<f32>,
}

impl FixedEmbedder {
    fn new(model: &str, vector: Vec<f32>) -> Self {
        Self {
            model: model.to_string(),
            vector,
        }
    }
}

#[async_trait]
impl QueryEmbedder for FixedEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(self.vector.clone())
    }
}

fn chunk(id: &str, document_id: &str, chunk_index: i64, text: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        document_id: document_id.to_string(),
        chunk_index,
        start_offset: 0,
        text: text.to_string(),
        hash: format!("hash-{id}"),
    }
}

#[tokio::test]
async fn top_k_orders_by_cosine_similarity() {
    let dir = TempDir::new().unwrap();
    let pool = fresh_pool(&dir).await;

    let chunks = vec![
        chunk("a", "doc", 0, "exactly aligned"),
        chunk("b", "doc", 1, "orthogonal"),
        chunk("c", "doc", 2, "mostly aligned"),
    ];
    let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.9, 0.1]];
    index::insert_batch(&pool, &chunks, &vectors).await.unwrap();

    let hits = index::query_top_k(&pool, &[1.0, 0.0], 2).await.unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].chunk_id, "a");
    assert_eq!(hits[1].chunk_id, "c");
    assert!(hits[0].score >= hits[1].score);
}

#[tokio::test]
async fn equal_scores_break_ties_on_chunk_id() {
    let dir = TempDir::new().unwrap();
    let pool = fresh_pool(&dir).await;

    let chunks = vec![
        chunk("z-last", "doc", 0, "same vector"),
        chunk("a-first", "doc", 1, "same vector"),
    ];
    let vectors = vec![vec![1.0, 0.0], vec![1.0, 0.0]];
    index::insert_batch(&pool, &chunks, &vectors).await.unwrap();

    let hits = index::query_top_k(&pool, &[1.0, 0.0], 2).await.unwrap();
    assert_eq!(hits[0].chunk_id, "a-first");
    assert_eq!(hits[1].chunk_id, "z-last");
}

#[tokio::test]
async fn rebuild_clears_stale_rows() {
    let dir = TempDir::new().unwrap();
    let pool = fresh_pool(&dir).await;

    let first = vec![chunk("old-1", "doc", 0, "stale text")];
    index::insert_batch(&pool, &first, &[vec![1.0, 0.0]])
        .await
        .unwrap();
    index::write_meta(&pool, "model-a", 2, 1).await.unwrap();

    // Second generation: clear then insert, same as an ingestion run.
    index::clear_index(&pool).await.unwrap();
    let second = vec![chunk("new-1", "doc", 0, "fresh text")];
    index::insert_batch(&pool, &second, &[vec![0.0, 1.0]])
        .await
        .unwrap();
    index::write_meta(&pool, "model-a", 2, 1).await.unwrap();

    let hits = index::query_top_k(&pool, &[1.0, 1.0], 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk_id, "new-1");
    assert_eq!(hits[0].text, "fresh text");
}

#[tokio::test]
async fn rebuilding_with_identical_vectors_gives_identical_ranking() {
    let dir = TempDir::new().unwrap();
    let pool = fresh_pool(&dir).await;

    let build = |gen: &str| {
        vec![
            chunk(&format!("{gen}-a"), "doc", 0, "first"),
            chunk(&format!("{gen}-b"), "doc", 1, "second"),
        ]
    };
    let vectors = vec![vec![0.2, 0.8], vec![0.7, 0.3]];

    index::insert_batch(&pool, &build("one"), &vectors)
        .await
        .unwrap();
    let before: Vec<String> = index::query_top_k(&pool, &[1.0, 0.0], 2)
        .await
        .unwrap()
        .into_iter()
        .map(|h| h.text)
        .collect();

    index::clear_index(&pool).await.unwrap();
    index::insert_batch(&pool, &build("two"), &vectors)
        .await
        .unwrap();
    let after: Vec<String> = index::query_top_k(&pool, &[1.0, 0.0], 2)
        .await
        .unwrap()
        .into_iter()
        .map(|h| h.text)
        .collect();

    assert_eq!(before, after);
    assert_eq!(before, vec!["second".to_string(), "first".to_string()]);
}

#[tokio::test]
async fn query_on_empty_index_returns_nothing() {
    let dir = TempDir::new().unwrap();
    let pool = fresh_pool(&dir).await;

    let hits = index::query_top_k(&pool, &[1.0, 0.0], 3).await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn insert_batch_rejects_mismatched_lengths() {
    let dir = TempDir::new().unwrap();
    let pool = fresh_pool(&dir).await;

    let chunks = vec![chunk("a", "doc", 0, "text")];
    let err = index::insert_batch(&pool, &chunks, &[]).await.unwrap_err();
    assert!(err.to_string().contains("mismatch"));
}

#[tokio::test]
async fn meta_writes_are_upserts() {
    let dir = TempDir::new().unwrap();
    let pool = fresh_pool(&dir).await;

    index::write_meta(&pool, "model-a", 2, 10).await.unwrap();
    index::write_meta(&pool, "model-b", 4, 20).await.unwrap();

    let model = index::read_meta(&pool, index::META_EMBEDDING_MODEL)
        .await
        .unwrap();
    assert_eq!(model.as_deref(), Some("model-b"));

    let dims = index::read_meta(&pool, index::META_EMBEDDING_DIMS)
        .await
        .unwrap();
    assert_eq!(dims.as_deref(), Some("4"));

    let count = index::read_meta(&pool, index::META_CHUNK_COUNT)
        .await
        .unwrap();
    assert_eq!(count.as_deref(), Some("20"));
}

#[tokio::test]
async fn model_pin_rejects_a_different_model() {
    let dir = TempDir::new().unwrap();
    let pool = fresh_pool(&dir).await;

    index::write_meta(&pool, "model-a", 2, 1).await.unwrap();

    assert!(index::verify_model_pin(&pool, "model-a").await.is_ok());

    let err = index::verify_model_pin(&pool, "model-b")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("model-a"));
    assert!(err.to_string().contains("model-b"));
}

#[tokio::test]
async fn model_pin_passes_on_an_unbuilt_index() {
    let dir = TempDir::new().unwrap();
    let pool = fresh_pool(&dir).await;

    assert!(index::verify_model_pin(&pool, "any-model").await.is_ok());
}

#[tokio::test]
async fn retriever_returns_sentinel_for_blank_input() {
    let dir = TempDir::new().unwrap();
    let pool = fresh_pool(&dir).await;

    let tool = RetrieverTool::new(&test_config(&dir), pool);

    // Blank input never reaches the embedding provider.
    let observation = tool.call("   ").await.unwrap();
    assert_eq!(observation, NO_RESULTS_MESSAGE);
}

#[tokio::test]
async fn retriever_returns_sentinel_on_an_empty_index() {
    let dir = TempDir::new().unwrap();
    let pool = fresh_pool(&dir).await;

    let tool = RetrieverTool::with_embedder(
        &test_config(&dir),
        pool,
        Box::new(FixedEmbedder::new("model-a", vec![1.0, 0.0])),
    );

    // The query runs against an index with no vectors at all.
    let observation = tool.call("anything at all").await.unwrap();
    assert_eq!(observation, NO_RESULTS_MESSAGE);
}

#[tokio::test]
async fn retriever_joins_hits_in_score_order() {
    let dir = TempDir::new().unwrap();
    let pool = fresh_pool(&dir).await;

    let chunks = vec![
        chunk("a", "doc", 0, "closest passage"),
        chunk("b", "doc", 1, "farther passage"),
        chunk("c", "doc", 2, "irrelevant passage"),
    ];
    let vectors = vec![vec![1.0, 0.0], vec![0.8, 0.2], vec![0.0, 1.0]];
    index::insert_batch(&pool, &chunks, &vectors).await.unwrap();
    index::write_meta(&pool, "model-a", 2, 3).await.unwrap();

    let mut config = test_config(&dir);
    config.retrieval.top_k = 2;
    let tool = RetrieverTool::with_embedder(
        &config,
        pool,
        Box::new(FixedEmbedder::new("model-a", vec![1.0, 0.0])),
    );

    let observation = tool.call("which passage?").await.unwrap();
    assert_eq!(
        observation,
        format!("closest passage{}farther passage", CHUNK_SEPARATOR)
    );
}

#[tokio::test]
async fn retriever_refuses_a_mismatched_model_pin() {
    let dir = TempDir::new().unwrap();
    let pool = fresh_pool(&dir).await;

    index::write_meta(&pool, "model-a", 2, 0).await.unwrap();

    let tool = RetrieverTool::with_embedder(
        &test_config(&dir),
        pool,
        Box::new(FixedEmbedder::new("model-b", vec![1.0, 0.0])),
    );

    let err = tool.call("anything").await.unwrap_err();
    assert!(err.to_string().contains("model-a"));
}
