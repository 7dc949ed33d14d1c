//! # CorpusQA
//!
//! A retrieval-augmented question-answering service over a local text
//! corpus.
//!
//! An offline ingestion run loads a directory of plain-text files, splits
//! them into overlapping chunks, embeds each chunk, and persists the
//! vectors into a SQLite-backed index. At query time an agent loop lets a
//! language model decide, round by round, whether to call the retrieval
//! tool (top-k similarity search) or emit a final answer, following a
//! Thought/Action/Observation text protocol.
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Corpus  │──▶│ Chunk + Embed │──▶│    SQLite    │
//! │  *.txt   │   │  (ingestion)  │   │ chunks + vec │
//! └──────────┘   └──────────────┘   └──────┬───────┘
//!                                          │ top-k search
//!                  POST /ask   ┌───────────▼──────────┐
//!                 ────────────▶│ Agent loop ⇄ LLM     │
//!                  { answer }  │  Thought/Action/Obs  │
//!                              └──────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```bash
//! cqa init                 # create the database
//! cqa ingest               # chunk + embed the corpus, rebuild the index
//! cqa search "growth"      # inspect raw retrieval results
//! cqa ask "What does the corpus say about growth?"
//! cqa serve                # POST /ask as an HTTP service
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types |
//! | [`corpus`] | Filesystem document loader |
//! | [`chunker`] | Overlapping fixed-size text chunking |
//! | [`embedding`] | Embedding provider boundary and vector utilities |
//! | [`index`] | Vector index rebuild and top-k query |
//! | [`ingest`] | Offline ingestion pipeline |
//! | [`llm`] | Completion model boundary |
//! | [`tool`] | Tool trait, registry, and the retriever tool |
//! | [`agent`] | ReAct protocol parser and the agent loop |
//! | [`server`] | HTTP API |

pub mod agent;
pub mod ask;
pub mod chunker;
pub mod config;
pub mod corpus;
pub mod db;
pub mod embedding;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod search;
pub mod server;
pub mod tool;
