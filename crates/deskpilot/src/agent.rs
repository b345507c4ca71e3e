use anyhow::Result;
use futures::stream::BoxStream;
use serde_json::{json, Value};

use crate::errors::AgentError;
use crate::models::conversation::Conversation;
use crate::models::message::{Message, MessageContent, ToolResult, ToolUse};
use crate::providers::base::{Provider, Usage};
use crate::tools::bash::BASH_TOOL_NAME;
use crate::tools::computer::COMPUTER_TOOL_NAME;
use crate::tools::{ToolOutput, ToolRegistry};

pub const DEFAULT_STOP_WORDS: [&str; 2] = ["exit", "quit"];

pub const DEFAULT_NUDGE: &str = "just keep working on the task and don't ask questions. \
    if you want to exit, type 'exit' or 'quit' in a text message response";

/// What to do when the model answers with text only and no stop word
#[derive(Debug, Clone, PartialEq)]
pub enum TerminationPolicy {
    /// Append `message` as a user turn and keep going
    Nudge { message: String },
    /// Treat a reply without tool calls as the end of the task
    StopWhenIdle,
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        TerminationPolicy::Nudge {
            message: DEFAULT_NUDGE.to_string(),
        }
    }
}

/// Replaces an empty result from one of `triggers` with the result of another tool call.
///
/// A shell command that launches a GUI program prints nothing, so by default an empty `bash`
/// result is swapped for a screenshot of whatever the command put on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct EmptyResultFallback {
    pub triggers: Vec<String>,
    pub tool: String,
    pub input: Value,
}

impl EmptyResultFallback {
    pub fn screenshot_after_bash() -> Self {
        Self {
            triggers: vec![BASH_TOOL_NAME.to_string()],
            tool: COMPUTER_TOOL_NAME.to_string(),
            input: json!({"action": "screenshot"}),
        }
    }

    fn applies_to(&self, tool_name: &str) -> bool {
        self.triggers.iter().any(|t| t == tool_name)
    }
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub system_prompt: String,
    /// Matched case-insensitively as substrings of the model's text
    pub stop_words: Vec<String>,
    pub termination: TerminationPolicy,
    pub empty_result_fallback: Option<EmptyResultFallback>,
    pub max_turns: Option<usize>,
}

impl AgentConfig {
    pub fn new<S: Into<String>>(system_prompt: S) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            stop_words: DEFAULT_STOP_WORDS.iter().map(|w| w.to_string()).collect(),
            termination: TerminationPolicy::default(),
            empty_result_fallback: None,
            max_turns: None,
        }
    }

    pub fn with_termination(mut self, termination: TerminationPolicy) -> Self {
        self.termination = termination;
        self
    }

    pub fn with_empty_result_fallback(mut self, fallback: EmptyResultFallback) -> Self {
        self.empty_result_fallback = Some(fallback);
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Done,
}

/// Totals for a finished run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub turns: usize,
    pub input_tokens: i64,
    pub output_tokens: i64,
}

impl RunSummary {
    fn record(&mut self, usage: &Usage) {
        self.turns += 1;
        self.input_tokens += usage.input_tokens.unwrap_or(0) as i64;
        self.output_tokens += usage.output_tokens.unwrap_or(0) as i64;
    }
}

/// Agent drives a model through tool calls against a set of tools until the task is done
pub struct Agent {
    provider: Box<dyn Provider>,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl Agent {
    pub fn new(provider: Box<dyn Provider>, tools: ToolRegistry, config: AgentConfig) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// True if any text block of `message` contains a stop word, ignoring case
    pub fn is_stop_signal(&self, message: &Message) -> bool {
        let stop_words: Vec<String> = self
            .config
            .stop_words
            .iter()
            .map(|w| w.to_lowercase())
            .collect();
        message.texts().iter().any(|text| {
            let text = text.to_lowercase();
            stop_words.iter().any(|word| text.contains(word.as_str()))
        })
    }

    async fn complete(&self, conversation: &Conversation) -> Result<(Message, Usage)> {
        tracing::debug!(messages = conversation.len(), "requesting model turn");
        self.provider
            .complete(
                &self.config.system_prompt,
                conversation.messages(),
                &self.tools.specs(),
            )
            .await
    }

    /// Run one tool by name. Never fails: a missing tool or a tool error becomes error output.
    async fn run_tool(&self, name: &str, input: Value) -> ToolOutput {
        let Some(tool) = self.tools.get(name) else {
            tracing::warn!(tool = name, "model requested an unknown tool");
            return AgentError::ToolNotFound(name.to_string()).into();
        };

        match tool.call(input).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "tool call failed");
                e.into()
            }
        }
    }

    async fn invoke(&self, tool_use: &ToolUse) -> ToolResult {
        tracing::info!(tool = %tool_use.name, id = %tool_use.id, "running tool");
        let mut output = self.run_tool(&tool_use.name, tool_use.input.clone()).await;

        if let Some(fallback) = &self.config.empty_result_fallback {
            if output.is_empty() && fallback.applies_to(&tool_use.name) {
                tracing::info!(
                    tool = %tool_use.name,
                    fallback = %fallback.tool,
                    "empty tool result, running fallback"
                );
                output = self.run_tool(&fallback.tool, fallback.input.clone()).await;
            }
        }

        output.into_tool_result(&tool_use.id)
    }

    /// Answer every tool use in `response`, one at a time and in order.
    ///
    /// Returns `None` when the response has no tool uses.
    pub async fn invoke_tools(&self, response: &Message) -> Option<Message> {
        let tool_uses = response.tool_uses();
        if tool_uses.is_empty() {
            return None;
        }

        let mut message = Message::user();
        for tool_use in tool_uses {
            let result = self.invoke(tool_use).await;
            message = message.with_content(MessageContent::ToolResult(result));
        }
        Some(message)
    }

    /// Decide what follows a model response: tool results, a nudge, or nothing.
    async fn follow_up(&self, response: &Message) -> (Option<Message>, LoopState) {
        if let Some(results) = self.invoke_tools(response).await {
            return (Some(results), LoopState::Running);
        }

        if self.is_stop_signal(response) {
            tracing::info!("model signalled completion");
            return (None, LoopState::Done);
        }

        match &self.config.termination {
            TerminationPolicy::Nudge { message } => {
                (Some(Message::user().with_text(message)), LoopState::Running)
            }
            TerminationPolicy::StopWhenIdle => (None, LoopState::Done),
        }
    }

    async fn step(&self, conversation: &mut Conversation) -> Result<(LoopState, Usage)> {
        let (response, usage) = self.complete(conversation).await?;
        conversation.push(response.clone());

        let (next, state) = self.follow_up(&response).await;
        if let Some(message) = next {
            conversation.push(message);
        }
        Ok((state, usage))
    }

    /// Run a single turn: one model call, then the tool calls or nudge it triggers.
    pub async fn turn(&self, conversation: &mut Conversation) -> Result<LoopState> {
        let (state, _) = self.step(conversation).await?;
        Ok(state)
    }

    /// Run turns until the task is done, the turn limit is hit or the model call fails.
    pub async fn run(&self, conversation: &mut Conversation) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        loop {
            if let Some(limit) = self.config.max_turns {
                if summary.turns >= limit {
                    return Err(AgentError::TurnLimit(limit).into());
                }
            }

            let (state, usage) = self.step(conversation).await?;
            summary.record(&usage);
            if state == LoopState::Done {
                return Ok(summary);
            }
        }
    }

    /// Create a stream that yields each message as it is appended to the conversation.
    /// The assistant's response is yielded before its tool calls start running.
    pub fn reply(&self, mut conversation: Conversation) -> BoxStream<'_, Result<Message>> {
        Box::pin(async_stream::try_stream! {
            let mut turns = 0;
            loop {
                if let Some(limit) = self.config.max_turns {
                    if turns >= limit {
                        Err::<(), _>(AgentError::TurnLimit(limit))?;
                    }
                }

                let (response, _) = self.complete(&conversation).await?;
                turns += 1;
                conversation.push(response.clone());
                yield response.clone();

                // Make sure the response is rendered before long running tools start
                tokio::task::yield_now().await;

                let (next, state) = self.follow_up(&response).await;
                if let Some(message) = next {
                    conversation.push(message.clone());
                    yield message;
                }

                if state == LoopState::Done {
                    break;
                }
            }
        })
    }
}
