//! The question-answering loop.
//!
//! One [`Agent::ask`] call is one turn:
//!
//! 1. Fail fast when there is no current frame.
//! 2. Start a new chain unless the previous command was also a question;
//!    the first question of a chain carries the breakpoint location.
//! 3. Offer the active tools with `tool_choice = required` for up to
//!    `max_depth` rounds, running every returned call in order, until the
//!    terminal tool runs.
//! 4. Invoke the terminal tool directly if the model never called it.
//! 5. Put the frame cursor back where the turn started.

use super::config::AgentConfig;
use super::events::{AgentEvent, EventHandler, NoopHandler};
use crate::api::CompletionProvider;
use crate::api::retry::complete_with_retry;
use crate::context::curator;
use crate::context::truncator::Truncator;
use crate::session::Session;
use crate::tools::{ToolContext, ToolError, ToolResult, ToolSet, Trajectory, TrajectoryEntry, default_tools};
use crate::ui::with_progress;
use crate::{ChatRequest, Message, ToolCall, ToolChoice};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that end a turn without an answer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("There is no active frame to ask about.")]
    NoActiveFrame,
    #[error("no terminal tool is registered")]
    NoTerminalTool,
    #[error("Failed to produce an answer: {0}")]
    Completion(String),
}

/// Drives the tool-calling loop against a [`Session`].
///
/// The agent owns the trajectory and conversation history of the current
/// follow-up chain; the session is borrowed per question. Each question
/// replays only its own tool calls to the model, while the answer sees
/// everything gathered since the chain began.
///
/// ```ignore
/// let mut agent = Agent::new(&client, AgentConfig::default());
/// let answer = agent.ask(&mut session, "why is `n` zero?").await?;
/// agent.record_command(); // the user ran `up` in the debugger
/// ```
pub struct Agent<'a> {
    provider: &'a dyn CompletionProvider,
    config: AgentConfig,
    tools: ToolSet,
    truncator: Truncator,
    event_handler: &'a dyn EventHandler,
    trajectory: Trajectory,
    history: Vec<Message>,
    last_was_question: bool,
    forced_calls: usize,
}

impl<'a> Agent<'a> {
    /// Create an agent with the standard tool set for `config`.
    pub fn new(provider: &'a dyn CompletionProvider, config: AgentConfig) -> Self {
        let tools = default_tools(&config);
        Self {
            provider,
            config,
            tools,
            truncator: Truncator::default(),
            event_handler: &NoopHandler,
            trajectory: Trajectory::new(),
            history: Vec::new(),
            last_was_question: false,
            forced_calls: 0,
        }
    }

    /// Replace the tool set.
    pub fn with_tools(mut self, tools: ToolSet) -> Self {
        self.tools = tools;
        self
    }

    /// Replace the truncator, e.g. to count tokens with a model tokenizer.
    pub fn with_truncator(mut self, truncator: Truncator) -> Self {
        self.truncator = truncator;
        self
    }

    pub fn with_event_handler(mut self, handler: &'a dyn EventHandler) -> Self {
        self.event_handler = handler;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    /// `(question, answer)` messages of the current chain.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Whether the next question continues the current chain.
    pub fn is_follow_up(&self) -> bool {
        self.last_was_question
    }

    /// Note that the user ran a command other than a question.
    pub fn record_command(&mut self) {
        self.last_was_question = false;
    }

    /// Forget the current chain.
    pub fn reset(&mut self) {
        self.trajectory.clear();
        self.history.clear();
        self.last_was_question = false;
    }

    /// Answer `query` about the program paused in `session`.
    ///
    /// The session's cursor is the same before and after the call, whatever
    /// the model navigated to.
    pub async fn ask(&mut self, session: &mut Session, query: &str) -> Result<String, AgentError> {
        if session.current_frame().is_none() {
            return Err(AgentError::NoActiveFrame);
        }

        let follow_up = self.last_was_question;
        if !follow_up {
            self.trajectory.clear();
            self.history.clear();
        }
        self.trajectory.begin_turn();
        self.event_handler
            .on_event(&AgentEvent::TurnStarted { query, follow_up });

        session.begin_turn();
        let prompt = curator::user_prompt(session, query, follow_up);
        let outcome = self.run_turn(session, &prompt).await;
        session.restore();

        match outcome {
            Ok(answer) => {
                self.history.push(Message::user(prompt));
                self.history.push(Message::assistant_text(answer.clone()));
                self.last_was_question = true;
                Ok(answer)
            }
            Err(e) => {
                self.last_was_question = false;
                Err(e)
            }
        }
    }

    async fn run_turn(&mut self, session: &mut Session, prompt: &str) -> Result<String, AgentError> {
        let terminal = self.tools.terminal_tool_name().ok_or(AgentError::NoTerminalTool)?;
        let max_rounds = self.config.max_depth;
        let mut rounds = 0;

        while rounds < max_rounds {
            rounds += 1;
            let definitions = self.tools.definitions(&self.trajectory, session);
            self.event_handler.on_event(&AgentEvent::RoundStart {
                round: rounds,
                max_rounds,
                tools_offered: definitions.len(),
            });

            let mut messages = vec![Message::system(curator::agent_prompt(
                session,
                &self.truncator,
                &self.config.budgets,
            ))];
            messages.extend(self.history.iter().cloned());
            messages.push(Message::user(prompt));
            messages.extend(self.trajectory.to_messages());
            let request = ChatRequest {
                model: Some(self.config.agent_model.clone()),
                messages,
                max_tokens: self.config.max_tokens,
                temperature: Some(self.config.temperature),
                tools: Some(definitions),
                tool_choice: Some(ToolChoice::Required),
                ..Default::default()
            };

            let completion = with_progress(
                self.config.show_progress,
                "Thinking...",
                complete_with_retry(self.provider, &request, &self.config.retry),
            )
            .await;
            let completion = match completion {
                Ok(c) => c,
                Err(e) => {
                    warn!("Tool selection failed in round {rounds}: {e}");
                    self.event_handler.on_event(&AgentEvent::ModelError(&e));
                    break;
                }
            };
            if completion.tool_calls.is_empty() {
                let text = completion.content.unwrap_or_default();
                debug!("Model replied without tool calls in round {rounds}");
                self.event_handler.on_event(&AgentEvent::Text(&text));
                break;
            }

            for call in &completion.tool_calls {
                let entry = self.execute(session, call, prompt).await;
                if entry.tool == terminal
                    && let Some(outcome) = terminal_outcome(&entry.result)
                {
                    self.trajectory.push(entry);
                    self.event_handler.on_event(&AgentEvent::Finished {
                        rounds,
                        forced: false,
                    });
                    return outcome;
                }
                self.trajectory.push(entry);
            }
        }

        if rounds >= max_rounds {
            self.event_handler
                .on_event(&AgentEvent::DepthLimitReached { max_depth: max_rounds });
        }
        self.event_handler
            .on_event(&AgentEvent::ForcedAnswer { tool: terminal });
        self.forced_calls += 1;
        let call = ToolCall::new(format!("forced_{}", self.forced_calls), terminal, "{}");
        let entry = self.execute(session, &call, prompt).await;
        let outcome = terminal_outcome(&entry.result)
            .unwrap_or_else(|| Err(AgentError::Completion(entry.rendered.clone())));
        self.trajectory.push(entry);
        self.event_handler
            .on_event(&AgentEvent::Finished { rounds, forced: true });
        outcome
    }

    async fn execute(&self, session: &mut Session, call: &ToolCall, prompt: &str) -> TrajectoryEntry {
        let name = call.function.name.as_str();
        self.event_handler.on_event(&AgentEvent::ToolExecuting {
            name,
            arguments: &call.function.arguments,
        });

        let mut ctx = ToolContext {
            session,
            trajectory: &self.trajectory,
            truncator: &self.truncator,
            provider: self.provider,
            config: &self.config,
            query: prompt,
            history: &self.history,
        };
        let message = format!("Running {name}...");
        let entry = with_progress(
            self.config.show_progress,
            &message,
            self.tools.execute(call, &mut ctx),
        )
        .await;

        self.event_handler.on_event(&AgentEvent::ToolResult {
            name,
            call_id: &entry.call_id,
            result: &entry.rendered,
            is_error: entry.result.is_error(),
        });
        info!(
            "Tool {name} -> {} ({} bytes)",
            if entry.result.is_error() { "error" } else { "ok" },
            entry.rendered.len()
        );
        entry
    }
}

/// The turn's result when the terminal tool actually ran. Validation
/// failures (e.g. bad arguments) leave the loop going.
fn terminal_outcome(result: &ToolResult) -> Option<Result<String, AgentError>> {
    match result {
        ToolResult::Answer { text } => Some(Ok(text.clone())),
        ToolResult::Error(ToolError::Completion(e)) => Some(Err(AgentError::Completion(e.clone()))),
        _ => None,
    }
}
