//! Tool abstraction and dispatch.
//!
//! The [`Tool`] trait describes one debugger capability offered to the
//! model: a definition built against the current session (so enums such as
//! legal move directions stay accurate), a liveness predicate, an async
//! `run`, and a `render` that turns the result into the text returned to
//! the model. Tools are collected into a [`ToolSet`], which exposes the
//! active definitions and validates every call before running it.

use super::result::{ToolError, ToolResult, Trajectory, TrajectoryEntry};
use crate::agent::config::AgentConfig;
use crate::api::CompletionProvider;
use crate::context::truncator::Truncator;
use crate::session::Session;
use crate::{Message, ToolCall, ToolDef};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, info, trace};

/// Boxed future returned by [`Tool::run`].
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = ToolResult> + Send + 'a>>;

/// Everything a tool may read or mutate while it runs.
///
/// The session is the only mutable piece; the trajectory is the log of
/// calls made so far in this question chain.
pub struct ToolContext<'a> {
    pub session: &'a mut Session,
    pub trajectory: &'a Trajectory,
    pub truncator: &'a Truncator,
    pub provider: &'a dyn CompletionProvider,
    pub config: &'a AgentConfig,
    /// The user's question for this turn, with any breakpoint context.
    pub query: &'a str,
    /// Earlier `(question, answer)` messages of the follow-up chain.
    pub history: &'a [Message],
}

// ── Tool trait ─────────────────────────────────────────────────────

/// A debugger capability the model can invoke.
///
/// Failures are returned as [`ToolResult::Error`] (or as a descriptive
/// information result, as with expression evaluation) rather than panics;
/// the dispatcher hands them back to the model either way.
pub trait Tool: Send + Sync {
    /// Wire name of the tool.
    fn name(&self) -> &'static str;

    /// Definition offered to the model given the current session.
    fn definition(&self, session: &Session) -> ToolDef;

    /// Whether running this tool ends the turn.
    fn is_terminal(&self) -> bool {
        false
    }

    /// Whether the tool may be offered and run right now.
    fn is_active(&self, trajectory: &Trajectory, session: &Session) -> bool {
        let _ = (trajectory, session);
        true
    }

    /// Run the tool with arguments already validated against
    /// [`definition`](Self::definition).
    fn run<'a>(&'a self, arguments: Value, ctx: &'a mut ToolContext<'_>) -> ToolFuture<'a>;

    /// Text returned to the model for `result`.
    fn render(&self, result: &ToolResult, ctx: &mut ToolContext<'_>) -> String {
        let _ = ctx;
        result.to_string()
    }
}

// ── ToolSet ────────────────────────────────────────────────────────

/// Registered tools in registration order, dispatched by name.
///
/// # Example
///
/// ```ignore
/// let tools = ToolSet::new()
///     .with(MoveTool)
///     .with(ArgsTool)
///     .with_if(config.file_search, FileSearchTool)
///     .with(AnswerTool);
///
/// let offered = tools.definitions(&trajectory, &session);
/// ```
#[derive(Default)]
pub struct ToolSet {
    tools: Vec<Box<dyn Tool>>,
}

impl fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSet")
            .field("tools", &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(Box::new(tool));
    }

    /// Register a tool (builder pattern).
    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    /// Register a tool only when `condition` holds.
    pub fn with_if(self, condition: bool, tool: impl Tool + 'static) -> Self {
        if condition { self.with(tool) } else { self }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Name of the first registered terminal tool.
    pub fn terminal_tool_name(&self) -> Option<&'static str> {
        self.tools.iter().find(|t| t.is_terminal()).map(|t| t.name())
    }

    /// Definitions of the tools that are active right now.
    pub fn definitions(&self, trajectory: &Trajectory, session: &Session) -> Vec<ToolDef> {
        self.tools
            .iter()
            .filter(|t| t.is_active(trajectory, session))
            .map(|t| t.definition(session))
            .collect()
    }

    /// Validate and run one tool call, producing the trajectory entry for
    /// it. Validation failures are returned as error entries.
    pub async fn execute(&self, call: &ToolCall, ctx: &mut ToolContext<'_>) -> TrajectoryEntry {
        let name = call.function.name.as_str();
        let raw = call.function.arguments.as_str();
        log_tool_call(name, raw);

        let (arguments, result, rendered) = match self.prepare(name, raw, ctx) {
            Err((arguments, error)) => {
                let result = ToolResult::Error(error);
                let rendered = result.to_string();
                (arguments, result, rendered)
            }
            Ok((tool, arguments)) => {
                let start = std::time::Instant::now();
                let result = tool.run(arguments.clone(), ctx).await;
                let rendered = tool.render(&result, ctx);
                debug!(
                    "Tool {name} completed in {:.0}ms ({} bytes)",
                    start.elapsed().as_secs_f64() * 1000.0,
                    rendered.len()
                );
                (arguments, result, rendered)
            }
        };
        trace!(
            "Tool {name} result preview: {}",
            rendered.chars().take(300).collect::<String>()
        );

        TrajectoryEntry {
            call_id: call.id.clone(),
            tool: name.to_string(),
            arguments,
            result,
            rendered,
        }
    }

    #[allow(clippy::type_complexity)]
    fn prepare(
        &self,
        name: &str,
        raw: &str,
        ctx: &ToolContext<'_>,
    ) -> Result<(&dyn Tool, Value), (Value, ToolError)> {
        let Some(tool) = self.get(name) else {
            return Err((
                Value::Null,
                ToolError::Validation(format!(
                    "unknown tool '{name}'. Available tools: {}",
                    self.names().join(", ")
                )),
            ));
        };
        if !tool.is_active(ctx.trajectory, ctx.session) {
            return Err((
                Value::Null,
                ToolError::Validation(format!(
                    "tool '{name}' is not available right now. \
                     Use one of the tools currently offered."
                )),
            ));
        }
        let arguments = parse_arguments(raw).map_err(|e| {
            (
                Value::Null,
                ToolError::Validation(format!(
                    "invalid JSON arguments for tool '{name}': {e}. \
                     Please provide valid JSON matching the tool's parameter schema."
                )),
            )
        })?;
        let schema = tool.definition(ctx.session).function.parameters;
        if let Some(errors) = validate_arguments(&schema, &arguments) {
            return Err((
                arguments,
                ToolError::Validation(format!(
                    "argument validation failed for tool '{name}':\n{errors}\n\
                     Please fix the arguments and try again."
                )),
            ));
        }
        Ok((tool, arguments))
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Parse raw tool arguments. An empty string means no arguments.
pub fn parse_arguments(raw: &str) -> Result<Value, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(raw)
}

/// Deserialize validated arguments into a typed struct.
pub fn deserialize_arguments<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| {
        ToolError::Validation(format!(
            "invalid arguments for tool '{tool}': {e}. \
             Please provide valid JSON matching the tool's parameter schema."
        ))
    })
}

/// Validate `arguments` against a JSON Schema. Returns the formatted
/// violations, one per line, or `None` when valid.
pub fn validate_arguments(schema: &Value, arguments: &Value) -> Option<String> {
    let validator = match jsonschema::validator_for(schema) {
        Ok(v) => v,
        Err(e) => {
            debug!("Skipping argument validation, schema is invalid: {e}");
            return None;
        }
    };
    let errors: Vec<String> = validator
        .iter_errors(arguments)
        .map(|e| format!("  - {}: {e}", e.instance_path()))
        .collect();
    if errors.is_empty() {
        None
    } else {
        Some(errors.join("\n"))
    }
}

/// Log a tool call at INFO level with a truncated preview of arguments.
pub fn log_tool_call(name: &str, arguments: &str) {
    let args_preview: String = arguments.chars().take(120).collect();
    info!(
        "[tool] {}({args_preview}{})",
        name,
        if arguments.chars().count() > 120 { "..." } else { "" }
    );
    debug!("[tool] {name} full args ({} bytes)", arguments.len());
    trace!("[tool] {name} arguments: {arguments}");
}

/// Object schema with the given properties, all required, rejecting
/// anything else.
pub fn object_schema(properties: Value, required: &[&str]) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

/// Schema of a tool that takes no arguments.
pub fn no_arguments() -> Value {
    object_schema(serde_json::json!({}), &[])
}

/// Shared description of the `explanation` argument.
pub const EXPLANATION_DESCRIPTION: &str = "One sentence explanation as to why this tool is being used, \
     and how it contributes to the goal.";
