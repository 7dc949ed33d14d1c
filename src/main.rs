//! # CorpusQA CLI (`cqa`)
//!
//! The `cqa` binary drives the full lifecycle: database initialization,
//! corpus ingestion, retrieval inspection, one-shot questions, and the
//! HTTP question-answering server.
//!
//! ```bash
//! cqa --config ./config/cqa.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cqa init` | Create the SQLite database and schema |
//! | `cqa ingest` | Rebuild the vector index from the corpus directory |
//! | `cqa search "<query>"` | Run a direct top-k similarity search |
//! | `cqa ask "<question>"` | Answer one question with the agent |
//! | `cqa serve` | Start the HTTP server (`POST /ask`) |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use corpusqa::{ask, config, ingest, migrate, search, server};

/// CorpusQA — retrieval-augmented question answering over a local text corpus.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/cqa.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "cqa",
    about = "CorpusQA — retrieval-augmented question answering over a local text corpus",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables. Safe to
    /// run repeatedly.
    Init,

    /// Rebuild the vector index from the corpus directory.
    ///
    /// Loads every matching text file under `[corpus].root`, chunks and
    /// embeds it, and replaces the persisted index wholesale. The old
    /// index is deleted before the new one is written — a failed run
    /// leaves no usable index until ingestion is re-run.
    Ingest {
        /// Show document and chunk counts without touching the index.
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a direct top-k similarity search and print the scored chunks.
    ///
    /// Bypasses the agent; useful for checking what the retriever tool
    /// would see for a given query.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of chunks to return (defaults to retrieval.top_k).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Answer one question with a single agent session and print the answer.
    Ask {
        /// The question to answer.
        question: String,
    },

    /// Start the HTTP question-answering server.
    ///
    /// Binds to `[server].bind` and exposes `POST /ask` and `GET /health`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { dry_run } => {
            ingest::run_ingest(&cfg, dry_run).await?;
        }
        Commands::Search { query, limit } => {
            search::run_search(&cfg, &query, limit).await?;
        }
        Commands::Ask { question } => {
            ask::run_ask(&cfg, &question).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
