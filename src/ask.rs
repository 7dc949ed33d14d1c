//! One-shot question answering from the CLI.
//!
//! Wires up the same retriever tool and completion model the HTTP server
//! uses, runs a single agent session, and prints the answer.

use anyhow::Result;

use crate::agent::AgentLoop;
use crate::config::Config;
use crate::db;
use crate::llm;
use crate::migrate;
use crate::tool::{RetrieverTool, ToolRegistry};

pub async fn run_ask(config: &Config, question: &str) -> Result<()> {
    if question.trim().is_empty() {
        anyhow::bail!("question must not be empty");
    }

    let pool = db::connect(config).await?;
    migrate::create_schema(&pool).await?;

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(RetrieverTool::new(config, pool.clone())));

    let model = llm::create_model(&config.llm)?;

    let agent = AgentLoop::new(model.as_ref(), &registry, config.agent.max_iterations);
    let answer = agent.run(question.trim()).await?;

    println!("{}", answer);

    pool.close().await;
    Ok(())
}
