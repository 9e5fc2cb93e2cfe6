//! Tool-calling agent for asking natural-language questions about a paused
//! program.
//!
//! `stackprobe` sits between a debugger that has stopped a program and a
//! language model reachable through the [OpenRouter](https://openrouter.ai/)
//! chat completions API. The model is given a small set of debugger tools
//! (move up/down the stack, print arguments, evaluate expressions, show
//! source, search the current file) and drives them until it has enough
//! evidence, at which point a terminal `answer` tool curates everything that
//! was gathered into a token-bounded prompt and writes the final response.
//!
//! The core abstraction is the [`Agent`](agent::harness::Agent): one call to
//! [`Agent::ask()`](agent::harness::Agent::ask) runs a complete turn, and the
//! session's frame cursor is restored afterwards so navigation done by the
//! model is invisible to the user.
//!
//! # Getting started
//!
//! ```ignore
//! use stackprobe::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api_key = std::env::var("OPENROUTER_KEY")?;
//!     let client = OpenRouterClient::new(api_key)?;
//!
//!     let debugger = SnapshotDebugger::from_path("stack.json")?;
//!     let config = AgentConfig::from_env();
//!     let mut session = Session::new(Box::new(debugger), config.hide_external_frames);
//!
//!     let mut agent = Agent::new(&client, config).with_event_handler(&LoggingHandler);
//!     let answer = agent.ask(&mut session, "why is `total` negative here?").await?;
//!     println!("{answer}");
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **The paused program:** [`Debugger`](session::Debugger) is the seam to
//!   the host debugger; [`Session`](session::Session) owns the frame cursor
//!   and [`navigator`](session::navigator) moves it.
//!   [`SnapshotDebugger`](session::snapshot::SnapshotDebugger) replays a JSON
//!   stack snapshot.
//! - **Tools:** the [`Tool`](tools::core::Tool) trait and
//!   [`ToolSet`](tools::core::ToolSet) dispatcher live in [`tools::core`]; each
//!   debugger tool has its own module under [`tools`].
//! - **Context curation:** [`context::chunks`] merges code selections,
//!   [`context::truncator`] enforces token ceilings, and
//!   [`context::curator`] assembles the prompts.
//! - **The model:** [`CompletionProvider`](api::CompletionProvider) abstracts
//!   the completion endpoint; [`OpenRouterClient`] is the HTTP implementation
//!   and [`ScriptedProvider`](api::scripted::ScriptedProvider) replays canned
//!   responses.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`agent`] | [`Agent`](agent::harness::Agent) loop, config, events |
//! | [`tools`] | Tool trait, dispatcher, trajectory, debugger tools |
//! | [`context`] | Tokenizer, truncation, chunk algebra, prompt curation |
//! | [`session`] | Debugger seam, frame cursor, navigation, snapshots |
//! | [`api`] | Completion provider trait, retry, scripted provider |
//! | [`ui`] | Progress spinner |

pub mod agent;
pub mod api;
pub mod context;
pub mod prelude;
pub mod session;
pub mod tools;
pub mod ui;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

// ── Constants ──────────────────────────────────────────────────────

pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default model for both tool selection and answer synthesis.
pub const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4";

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`.
///
/// Argument structs are declared with `#[serde(deny_unknown_fields)]` so the
/// generated schema carries `additionalProperties: false`.
///
/// # Example
///
/// ```
/// use stackprobe::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// #[serde(deny_unknown_fields)]
/// struct PrintArgs {
///     expression: String,
/// }
///
/// let schema = json_schema_for::<PrintArgs>();
/// assert_eq!(schema["type"], "object");
/// assert_eq!(schema["additionalProperties"], false);
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body. Unused optional fields are omitted from
/// serialization.
#[derive(Serialize, Debug, Default, Clone)]
pub struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    pub messages: Vec<Message>,

    #[serde(skip_serializing_if = "is_zero_u32")]
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningConfig>,
}

/// Configuration for extended thinking / reasoning tokens.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ReasoningConfig {
    /// Direct token budget for reasoning (Anthropic/Gemini style).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Use reasoning internally but omit from response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<bool>,
}

impl ReasoningConfig {
    /// A thinking budget with the reasoning text left out of the reply.
    pub fn budget(max_tokens: u32) -> Self {
        Self {
            max_tokens: Some(max_tokens),
            exclude: Some(true),
        }
    }
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

/// How the model must respond to the offered tools. The loop always
/// requires a tool call.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model must call one of the offered tools.
    Required,
}

/// JSON output format type.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ResponseFormatType {
    #[serde(rename = "json_schema")]
    JsonSchema,
}

/// Named schema for structured JSON output.
#[derive(Serialize, Clone, Debug)]
pub struct JsonSchemaFormat {
    pub name: String,
    pub strict: bool,
    pub schema: serde_json::Value,
}

/// JSON output mode.
#[derive(Serialize, Clone, Debug)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub fmt_type: ResponseFormatType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<JsonSchemaFormat>,
}

impl ResponseFormat {
    /// Strict structured output validated against `schema`.
    pub fn json_schema(name: impl Into<String>, schema: serde_json::Value) -> Self {
        Self {
            fmt_type: ResponseFormatType::JsonSchema,
            json_schema: Some(JsonSchemaFormat {
                name: name.into(),
                strict: true,
                schema,
            }),
        }
    }
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    pub role: MessageRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: None,
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }
}

// ── Tool types ─────────────────────────────────────────────────────

/// The type of a tool definition. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

/// Tool definition sent to the API (OpenAI function-calling format).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: FunctionDef,
}

impl ToolDef {
    /// Create a function-calling tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: ToolType::Function,
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// The type of a tool call. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum CallType {
    #[serde(rename = "function")]
    Function,
}

/// A tool call returned by the model.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: CallType,
    pub function: FunctionCallData,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: CallType::Function,
            function: FunctionCallData {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FunctionCallData {
    pub name: String,
    pub arguments: String,
}

// ── Response types ─────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
    reasoning: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// Clean return type from [`OpenRouterClient::chat()`].
#[derive(Debug, Clone, Default)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<UsageInfo>,
    pub finish_reason: Option<String>,
    /// Reasoning / extended thinking content returned by the model.
    pub reasoning: Option<String>,
}

impl ChatCompletion {
    /// A text-only completion.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// A completion that calls the given tools.
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Default::default()
        }
    }
}

/// Token usage statistics.
#[derive(Deserialize, Debug, Clone)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the OpenRouter chat completions API.
pub struct OpenRouterClient {
    pub(crate) client: reqwest::Client,
    pub(crate) api_key: String,
    pub(crate) referer: String,
    pub(crate) title: String,
}

impl OpenRouterClient {
    /// Create a new client with the given API key and default headers.
    pub fn new(api_key: impl Into<String>) -> Result<Self, String> {
        Self::with_headers(api_key, "https://crates.io/crates/stackprobe", "stackprobe")
    }

    /// Create a client from the `OPENROUTER_KEY` environment variable.
    pub fn from_env() -> Result<Self, String> {
        let api_key =
            std::env::var("OPENROUTER_KEY").map_err(|_| "OPENROUTER_KEY not set".to_string())?;
        Self::new(api_key)
    }

    /// Create a new client with custom Referer and X-Title headers.
    pub fn with_headers(
        api_key: impl Into<String>,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent("stackprobe/0.1")
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            referer: referer.into(),
            title: title.into(),
        })
    }

    /// Send a chat completion request.
    pub async fn chat(&self, body: &ChatRequest) -> Result<ChatCompletion, String> {
        let tool_count = body.tools.as_ref().map_or(0, |t| t.len());
        debug!(
            "LLM request: model={}, messages={}, tools={}, max_tokens={}, temp={:?}",
            body.model.as_deref().unwrap_or("(none)"),
            body.messages.len(),
            tool_count,
            body.max_tokens,
            body.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(OPENROUTER_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(format!("OpenRouter API HTTP {status}: {text}"));
        }

        parse_chat_response(&text)
    }
}

/// Decode a raw response body into a [`ChatCompletion`].
fn parse_chat_response(text: &str) -> Result<ChatCompletion, String> {
    let parsed: RawChatResponse =
        serde_json::from_str(text).map_err(|e| format!("failed to parse response: {e}"))?;

    if let Some(err) = parsed.error {
        return Err(format!("OpenRouter API error: {}", err.message));
    }

    if let Some(ref usage) = parsed.usage {
        debug!(
            "Token usage: prompt={}, completion={}, total={}",
            usage.prompt_tokens.unwrap_or(0),
            usage.completion_tokens.unwrap_or(0),
            usage.total_tokens.unwrap_or(0),
        );
    }

    let Some(choice) = parsed.choices.and_then(|c| c.into_iter().next()) else {
        debug!("LLM output: empty (no choices)");
        return Ok(ChatCompletion {
            usage: parsed.usage,
            ..Default::default()
        });
    };

    let tool_calls = choice.message.tool_calls.unwrap_or_default();
    debug!(
        "LLM output: {} chars text, {} tool call(s)",
        choice.message.content.as_ref().map_or(0, |s| s.len()),
        tool_calls.len()
    );

    Ok(ChatCompletion {
        content: choice.message.content,
        tool_calls,
        usage: parsed.usage,
        finish_reason: choice.finish_reason,
        reasoning: choice.message.reasoning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors() {
        let sys = Message::system("hello");
        assert_eq!(sys.role, MessageRole::System);
        assert_eq!(sys.content.as_deref(), Some("hello"));

        let tool = Message::tool_result("call-1", "result");
        assert_eq!(tool.role, MessageRole::Tool);
        assert_eq!(tool.tool_call_id.as_deref(), Some("call-1"));
    }

    #[test]
    fn chat_request_default_skips_none_fields() {
        let req = ChatRequest {
            model: Some("test-model".into()),
            messages: vec![Message::user("hi")],
            max_tokens: 100,
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("tools").is_none());
        assert!(json.get("tool_choice").is_none());
        assert!(json.get("temperature").is_none());
        assert_eq!(json["max_tokens"], 100);
    }

    #[test]
    fn tool_choice_serializes_to_openai_shape() {
        assert_eq!(
            serde_json::to_value(ToolChoice::Required).unwrap(),
            serde_json::json!("required")
        );
    }

    #[test]
    fn response_format_carries_schema() {
        let fmt = ResponseFormat::json_schema("ranges", serde_json::json!({"type": "object"}));
        let json = serde_json::to_value(&fmt).unwrap();
        assert_eq!(json["type"], "json_schema");
        assert_eq!(json["json_schema"]["name"], "ranges");
        assert_eq!(json["json_schema"]["strict"], true);
    }

    #[test]
    fn parse_response_with_tool_call() {
        let body = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "c1",
                        "type": "function",
                        "function": {"name": "args", "arguments": "{}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}
        }"#;
        let completion = parse_chat_response(body).unwrap();
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].function.name, "args");
        assert_eq!(completion.finish_reason.as_deref(), Some("tool_calls"));
    }

    #[test]
    fn parse_response_surfaces_api_error() {
        let err = parse_chat_response(r#"{"error": {"message": "no credits"}}"#).unwrap_err();
        assert!(err.contains("no credits"));
    }

    #[test]
    fn parse_response_without_choices_is_empty() {
        let completion = parse_chat_response(r#"{"choices": []}"#).unwrap();
        assert!(completion.content.is_none());
        assert!(completion.tool_calls.is_empty());
    }
}
