//! Events emitted by the [`Agent`](super::harness::Agent) during a turn.
//!
//! # Choosing an event handler
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or quiet runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures, e.g. echoing tool calls in a REPL |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |

use tracing::{debug, info, warn};

// ── Events ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum AgentEvent<'a> {
    /// A question was received.
    TurnStarted { query: &'a str, follow_up: bool },
    /// A tool-selection round is starting.
    RoundStart {
        round: u32,
        max_rounds: u32,
        tools_offered: usize,
    },
    /// The model replied with text instead of tool calls.
    Text(&'a str),
    /// The tool-selection request failed after retries.
    ModelError(&'a str),
    /// A tool call is about to run.
    ToolExecuting { name: &'a str, arguments: &'a str },
    /// A tool call finished. `is_error` is set for validation, navigation
    /// and resource failures.
    ToolResult {
        name: &'a str,
        call_id: &'a str,
        result: &'a str,
        is_error: bool,
    },
    /// The round limit was reached without the terminal tool running.
    DepthLimitReached { max_depth: u32 },
    /// The terminal tool is being invoked directly.
    ForcedAnswer { tool: &'a str },
    /// The turn produced an answer.
    Finished { rounds: u32, forced: bool },
}

/// Observer of agent events.
///
/// # Example
///
/// ```ignore
/// struct Echo;
///
/// impl EventHandler for Echo {
///     fn on_event(&self, event: &AgentEvent<'_>) {
///         if let AgentEvent::ToolExecuting { name, arguments } = event {
///             eprintln!("{name}({arguments})");
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &AgentEvent<'_>) {
        let _ = event;
    }
}

pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
pub struct FnEventHandler<F>(F)
where
    F: Fn(&AgentEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&AgentEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&AgentEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &AgentEvent<'_>) {
        (self.0)(event)
    }
}

/// Dispatches every event to each inner handler in registration order.
///
/// ```ignore
/// let handler = CompositeEventHandler::new()
///     .with(LoggingHandler)
///     .with_if(echo_tools, tool_echo);
/// ```
#[derive(Default)]
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &AgentEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// Logs events through `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &AgentEvent<'_>) {
        match event {
            AgentEvent::TurnStarted { query, follow_up } => {
                let preview: String = query.chars().take(120).collect();
                info!("Question{}: {preview}", if *follow_up { " (follow-up)" } else { "" });
            }
            AgentEvent::RoundStart {
                round,
                max_rounds,
                tools_offered,
            } => {
                info!("[round {round}/{max_rounds}] {tools_offered} tool(s) offered");
            }
            AgentEvent::Text(text) => {
                let preview: String = text.chars().take(200).collect();
                debug!(
                    "LLM text: {preview}{}",
                    if text.len() > 200 { "..." } else { "" }
                );
            }
            AgentEvent::ModelError(e) => warn!("Tool selection failed: {e}"),
            AgentEvent::ToolExecuting { name, .. } => debug!("Executing tool: {name}"),
            AgentEvent::ToolResult {
                name,
                result,
                is_error,
                ..
            } => {
                if *is_error {
                    info!("Tool {name} failed: {result}");
                } else {
                    debug!("Tool {name} result: {} bytes", result.len());
                }
            }
            AgentEvent::DepthLimitReached { max_depth } => {
                info!("Agent hit the depth limit ({max_depth})");
            }
            AgentEvent::ForcedAnswer { tool } => info!("Forcing a call to {tool}"),
            AgentEvent::Finished { rounds, forced } => {
                info!("Answered after {rounds} round(s){}", if *forced { " (forced)" } else { "" });
            }
        }
    }
}
