//! Shared test doubles: scripted completion models and a recording tool.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use corpusqa::llm::CompletionModel;
use corpusqa::tool::Tool;

/// Returns a fixed sequence of replies, one per call, and records every
/// prompt it was given. Errors if called after the script runs out.
pub struct ScriptedModel {
    replies: Mutex<Vec<String>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompt(&self, i: usize) -> String {
        self.prompts.lock().unwrap()[i].clone()
    }
}

#[async_trait]
impl CompletionModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            anyhow::bail!("scripted model: no replies left");
        }
        Ok(replies.remove(0))
    }
}

/// Always returns the same reply, counting calls. For exercising the
/// retry-until-budget path.
pub struct RepeatingModel {
    reply: String,
    pub calls: Mutex<usize>,
}

impl RepeatingModel {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl CompletionModel for RepeatingModel {
    fn model_name(&self) -> &str {
        "repeating"
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        *self.calls.lock().unwrap() += 1;
        Ok(self.reply.clone())
    }
}

/// Fails every call, like an unreachable backend.
pub struct FailingModel;

#[async_trait]
impl CompletionModel for FailingModel {
    fn model_name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        anyhow::bail!("completion backend unreachable")
    }
}

/// A tool that records its inputs and returns a fixed observation.
/// The call log is shared, so it stays readable after the tool is
/// boxed into a registry.
pub struct RecordingTool {
    name: String,
    reply: String,
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingTool {
    pub fn new(name: &str, reply: &str) -> Self {
        Self {
            name: name.to_string(),
            reply: reply.to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Records its input and returns a canned passage"
    }

    async fn call(&self, input: &str) -> Result<String> {
        self.calls.lock().unwrap().push(input.to_string());
        Ok(self.reply.clone())
    }
}
