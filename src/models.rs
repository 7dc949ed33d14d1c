//! Core data types used throughout CorpusQA.
//!
//! These types represent the documents and chunks that flow through the
//! ingestion pipeline and the scored results returned by retrieval.

/// A source document loaded from the corpus directory.
///
/// Created by the corpus loader, consumed by the chunker, and discarded
/// once its chunks are produced.
#[derive(Debug, Clone)]
pub struct Document {
    /// Path relative to the corpus root; doubles as the document identifier.
    pub relative_path: String,
    /// Full raw content of the file.
    pub body: String,
}

/// A bounded-length slice of a document's text, the unit of embedding
/// and retrieval.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    /// Character offset of this chunk's first character in the source
    /// document body.
    pub start_offset: i64,
    pub text: String,
    pub hash: String,
}

/// A chunk returned from a top-k similarity query, with its score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub start_offset: i64,
    pub text: String,
    /// Cosine similarity against the query vector, higher is better.
    pub score: f64,
}
