//! The question-answering agent loop.
//!
//! One session answers one question. Each round the loop renders a prompt
//! (fixed instructions, the registered tools, the question, and the
//! scratchpad so far), asks the completion model for a reply, and parses
//! it into one of two shapes:
//!
//! ```text
//! Thought: ...
//! Action: <tool name>
//! Action Input: <tool input>
//! ```
//!
//! or
//!
//! ```text
//! Thought: ...
//! Final Answer: <answer text>
//! ```
//!
//! Parsing is a dedicated function with explicit outcomes — a reply that
//! matches neither shape (or names an unknown tool) is a recoverable
//! failure: a corrective observation goes into the scratchpad and the
//! model gets another attempt, consuming one iteration. When the
//! iteration budget runs out the loop still returns an answer, never an
//! error and never an empty string. Only completion-transport failures
//! propagate to the caller.

use anyhow::Result;
use std::fmt;

use crate::llm::CompletionModel;
use crate::tool::ToolRegistry;

/// Answer returned when the iteration budget is exhausted without a
/// `Final Answer:` from the model.
pub const BUDGET_EXHAUSTED_ANSWER: &str =
    "I was unable to complete the research within the allotted number of steps. \
     Please try again or rephrase the question.";

// ============ Protocol parsing ============

/// A successfully parsed model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The model wants to call a tool and observe its result.
    Act {
        thought: Option<String>,
        tool: String,
        input: String,
    },
    /// The model is done and this is the answer.
    Finish {
        thought: Option<String>,
        answer: String,
    },
}

/// Why a model reply could not be parsed. All variants are recoverable:
/// the loop feeds the reason back to the model and retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    /// Neither `Action:` nor `Final Answer:` appeared.
    MissingMarker,
    /// Both `Action:` and `Final Answer:` appeared; the intent is unclear.
    Ambiguous,
    /// `Action:` without an `Action Input:` line.
    MissingActionInput,
    /// `Action:` with nothing after it.
    EmptyActionName,
    /// `Final Answer:` with nothing after it.
    EmptyFinalAnswer,
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseFailure::MissingMarker => {
                write!(f, "the reply contained neither an 'Action:' line nor a 'Final Answer:' line")
            }
            ParseFailure::Ambiguous => {
                write!(f, "the reply contained both an 'Action:' line and a 'Final Answer:' line")
            }
            ParseFailure::MissingActionInput => {
                write!(f, "the 'Action:' line was not followed by an 'Action Input:' line")
            }
            ParseFailure::EmptyActionName => {
                write!(f, "the 'Action:' line did not name a tool")
            }
            ParseFailure::EmptyFinalAnswer => {
                write!(f, "the 'Final Answer:' line was empty")
            }
        }
    }
}

const THOUGHT_MARKER: &str = "Thought:";
const ACTION_MARKER: &str = "Action:";
const ACTION_INPUT_MARKER: &str = "Action Input:";
const FINAL_ANSWER_MARKER: &str = "Final Answer:";
const OBSERVATION_MARKER: &str = "Observation:";

fn is_marker_line(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with(THOUGHT_MARKER)
        || line.starts_with(ACTION_MARKER)
        || line.starts_with(ACTION_INPUT_MARKER)
        || line.starts_with(FINAL_ANSWER_MARKER)
        || line.starts_with(OBSERVATION_MARKER)
}

/// Parse raw model output into a [`Decision`].
///
/// Marker matching is line-oriented: a marker counts only at the start of
/// a line (leading whitespace allowed), so prose that merely mentions
/// "Action:" mid-sentence does not trigger it. `Action Input:` and
/// `Final Answer:` capture the remainder of their line plus any following
/// lines up to the next marker (or end of text), so multi-line inputs and
/// answers survive.
pub fn parse_decision(text: &str) -> Result<Decision, ParseFailure> {
    let lines: Vec<&str> = text.lines().collect();

    let mut thought: Option<String> = None;
    let mut action_line: Option<usize> = None;
    let mut final_line: Option<usize> = None;
    let mut input_line: Option<usize> = None;

    for (i, raw) in lines.iter().enumerate() {
        let line = raw.trim_start();
        if let Some(rest) = line.strip_prefix(THOUGHT_MARKER) {
            if thought.is_none() {
                let t = rest.trim();
                if !t.is_empty() {
                    thought = Some(t.to_string());
                }
            }
        } else if line.starts_with(ACTION_INPUT_MARKER) {
            if input_line.is_none() {
                input_line = Some(i);
            }
        } else if line.starts_with(ACTION_MARKER) {
            if action_line.is_none() {
                action_line = Some(i);
            }
        } else if line.starts_with(FINAL_ANSWER_MARKER) {
            if final_line.is_none() {
                final_line = Some(i);
            }
        }
    }

    match (action_line, final_line) {
        (Some(_), Some(_)) => Err(ParseFailure::Ambiguous),
        (None, None) => Err(ParseFailure::MissingMarker),
        (None, Some(idx)) => {
            let answer = capture_block(&lines, idx, FINAL_ANSWER_MARKER);
            if answer.is_empty() {
                Err(ParseFailure::EmptyFinalAnswer)
            } else {
                Ok(Decision::Finish { thought, answer })
            }
        }
        (Some(idx), None) => {
            let tool = clean_tool_name(
                lines[idx]
                    .trim_start()
                    .strip_prefix(ACTION_MARKER)
                    .unwrap_or(""),
            );
            if tool.is_empty() {
                return Err(ParseFailure::EmptyActionName);
            }
            let input_idx = input_line.ok_or(ParseFailure::MissingActionInput)?;
            let input = capture_block(&lines, input_idx, ACTION_INPUT_MARKER);
            Ok(Decision::Act {
                thought,
                tool,
                input,
            })
        }
    }
}

/// Text after `marker` on line `idx`, plus following lines until the next
/// marker line, trimmed.
fn capture_block(lines: &[&str], idx: usize, marker: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();

    let first = lines[idx].trim_start().strip_prefix(marker).unwrap_or("");
    parts.push(first);

    for line in lines.iter().skip(idx + 1) {
        if is_marker_line(line) {
            break;
        }
        parts.push(line);
    }

    parts.join("\n").trim().to_string()
}

/// Models like to decorate tool names with backticks, brackets, or quotes.
fn clean_tool_name(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '`' || c == '[' || c == ']' || c == '"' || c == '\'')
        .trim()
        .to_string()
}

// ============ Scratchpad ============

/// One record in a session's history.
#[derive(Debug, Clone)]
enum Step {
    /// A completed tool round: what the model decided and what it saw.
    ToolCall {
        thought: Option<String>,
        tool: String,
        input: String,
        observation: String,
    },
    /// Corrective feedback after an unparseable reply or unknown tool.
    Correction { note: String },
}

/// Append-only per-session history, rendered into every prompt. Owned by
/// exactly one session and dropped with it; nothing is shared across
/// requests.
#[derive(Debug, Default)]
pub struct Scratchpad {
    steps: Vec<Step>,
}

impl Scratchpad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_tool_call(
        &mut self,
        thought: Option<String>,
        tool: String,
        input: String,
        observation: String,
    ) {
        self.steps.push(Step::ToolCall {
            thought,
            tool,
            input,
            observation,
        });
    }

    pub fn push_correction(&mut self, note: String) {
        self.steps.push(Step::Correction { note });
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Render the history in the same format the model is instructed to
    /// produce, so each prompt reads as a continuous transcript.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            match step {
                Step::ToolCall {
                    thought,
                    tool,
                    input,
                    observation,
                } => {
                    if let Some(t) = thought {
                        out.push_str(&format!("Thought: {}\n", t));
                    }
                    out.push_str(&format!("Action: {}\n", tool));
                    out.push_str(&format!("Action Input: {}\n", input));
                    out.push_str(&format!("Observation: {}\n", observation));
                }
                Step::Correction { note } => {
                    out.push_str(&format!("Observation: {}\n", note));
                }
            }
        }
        out
    }
}

// ============ Prompt rendering ============

/// Build the full prompt for one decision round.
pub fn render_prompt(question: &str, tools: &ToolRegistry, scratchpad: &Scratchpad) -> String {
    let tool_lines: Vec<String> = tools
        .tools()
        .iter()
        .map(|t| format!("{}: {}", t.name(), t.description()))
        .collect();
    let tool_names = tools.names().join(", ");

    format!(
        "You are a careful research assistant. Your goal is to provide accurate and \
complete answers to user questions based on an indexed document corpus.\n\
\n\
To gather source material you MUST use the tools listed below. You may need to \
use a tool multiple times to collect enough material for a complex question. \
When your research is complete, synthesize what you found into a final, \
coherent answer that cites the passages you relied on.\n\
\n\
TOOLS:\n\
------\n\
You have access to the following tools:\n\
{tools}\n\
\n\
To use a tool, reply in exactly this format:\n\
\n\
Thought: Do I need to use a tool? Yes\n\
Action: the tool to use, one of [{tool_names}]\n\
Action Input: the input to the tool\n\
Observation: the result of the tool\n\
\n\
When you have the answer for the user, or no tool is needed, reply in exactly \
this format:\n\
\n\
Thought: Do I need to use a tool? No\n\
Final Answer: your complete answer here\n\
\n\
Begin!\n\
\n\
New input: {question}\n\
{scratchpad}",
        tools = tool_lines.join("\n"),
        tool_names = tool_names,
        question = question,
        scratchpad = scratchpad.render(),
    )
}

// ============ The loop ============

/// A bounded ReAct-style decision loop over a completion model and a tool
/// registry. Stateless between runs; every [`run`](AgentLoop::run) call is
/// an independent session with its own scratchpad.
pub struct AgentLoop<'a> {
    model: &'a dyn CompletionModel,
    tools: &'a ToolRegistry,
    max_iterations: usize,
}

impl<'a> AgentLoop<'a> {
    pub fn new(model: &'a dyn CompletionModel, tools: &'a ToolRegistry, max_iterations: usize) -> Self {
        Self {
            model,
            tools,
            max_iterations,
        }
    }

    /// Drive one session to completion.
    ///
    /// Returns the model's final answer, or [`BUDGET_EXHAUSTED_ANSWER`]
    /// if the iteration cap is reached first. Errors only on completion
    /// transport failures or tool execution failures — never on malformed
    /// model output.
    pub async fn run(&self, question: &str) -> Result<String> {
        let mut scratchpad = Scratchpad::new();

        for iteration in 1..=self.max_iterations {
            let prompt = render_prompt(question, self.tools, &scratchpad);
            let reply = self.model.complete(&prompt).await?;

            match parse_decision(&reply) {
                Ok(Decision::Finish { answer, .. }) => {
                    tracing::info!(iteration, "agent finished");
                    return Ok(answer);
                }
                Ok(Decision::Act {
                    thought,
                    tool,
                    input,
                }) => match self.tools.find(&tool) {
                    Some(t) => {
                        tracing::info!(iteration, tool = %tool, "agent calling tool");
                        let observation = t.call(&input).await?;
                        scratchpad.push_tool_call(thought, tool, input, observation);
                    }
                    None => {
                        tracing::warn!(iteration, tool = %tool, "agent named unknown tool");
                        scratchpad.push_correction(format!(
                            "'{}' is not a valid tool. The available tools are: [{}]. \
                             Reply again using the required format.",
                            tool,
                            self.tools.names().join(", ")
                        ));
                    }
                },
                Err(failure) => {
                    tracing::warn!(iteration, %failure, "agent reply unparseable");
                    scratchpad.push_correction(format!(
                        "Your previous reply could not be processed: {}. \
                         Reply again using the required format.",
                        failure
                    ));
                }
            }
        }

        tracing::warn!(
            max_iterations = self.max_iterations,
            "agent iteration budget exhausted"
        );
        Ok(BUDGET_EXHAUSTED_ANSWER.to_string())
    }
}
