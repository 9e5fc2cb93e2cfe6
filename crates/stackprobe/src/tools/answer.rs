//! `answer`: the terminal tool.
//!
//! Assembles the answer prompt from everything gathered this turn and sends
//! it, with the follow-up history and the user's question, to the answer
//! model.

use super::core::{Tool, ToolContext, ToolFuture, no_arguments};
use super::result::{ToolError, ToolResult};
use crate::api::retry::complete_with_retry;
use crate::context::curator;
use crate::session::Session;
use crate::{ChatRequest, Message, ReasoningConfig, ToolDef};
use serde_json::Value;
use tracing::{debug, warn};

pub const ANSWER_TOOL_NAME: &str = "answer";

pub struct AnswerTool;

impl AnswerTool {
    fn request(ctx: &mut ToolContext<'_>) -> ChatRequest {
        let system = curator::answer_prompt(
            ctx.session,
            ctx.trajectory,
            ctx.truncator,
            &ctx.config.budgets,
            ctx.config.max_gap_fill,
        );
        let mut messages = Vec::with_capacity(ctx.history.len() + 2);
        messages.push(Message::system(system));
        messages.extend(ctx.history.iter().cloned());
        messages.push(Message::user(ctx.query));

        let thinking = ctx.config.thinking_tokens;
        ChatRequest {
            model: Some(ctx.config.answer_model.clone()),
            messages,
            max_tokens: ctx.config.max_tokens.max(thinking + 1),
            temperature: Some(ctx.config.temperature),
            reasoning: (thinking > 0).then(|| ReasoningConfig::budget(thinking)),
            ..Default::default()
        }
    }
}

impl Tool for AnswerTool {
    fn name(&self) -> &'static str {
        ANSWER_TOOL_NAME
    }

    fn definition(&self, _session: &Session) -> ToolDef {
        ToolDef::new(
            ANSWER_TOOL_NAME,
            "Call this when you have enough information to answer the user's query.",
            no_arguments(),
        )
    }

    fn is_terminal(&self) -> bool {
        true
    }

    fn run<'a>(&'a self, _arguments: Value, ctx: &'a mut ToolContext<'_>) -> ToolFuture<'a> {
        Box::pin(async move {
            let request = Self::request(ctx);
            debug!(
                "Requesting answer from {} ({} messages)",
                ctx.config.answer_model,
                request.messages.len()
            );
            match complete_with_retry(ctx.provider, &request, &ctx.config.retry).await {
                Ok(completion) => ToolResult::Answer {
                    text: completion.content.unwrap_or_default().trim().to_string(),
                },
                Err(e) => {
                    warn!("Answer request failed: {e}");
                    ToolError::Completion(e).into()
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ScriptedProvider;
    use crate::session::testing::session;
    use crate::tools::args::ArgsTool;
    use crate::tools::testing::Fixture;
    use crate::MessageRole;
    use serde_json::json;

    #[tokio::test]
    async fn sends_curated_prompt_with_history() {
        let mut fx = Fixture::new(session(3, 2));
        fx.provider = ScriptedProvider::new().then_text("  Because n is 2.\n");
        fx.history = vec![Message::user("first?"), Message::assistant_text("first.")];
        fx.record(&ArgsTool, json!({})).await;

        let (result, text) = fx.run(&AnswerTool, json!({})).await;
        assert_eq!(result, ToolResult::Answer { text: "Because n is 2.".into() });
        assert_eq!(text, "Because n is 2.");

        let request = &fx.provider.requests()[0];
        assert_eq!(request.model.as_deref(), Some(fx.config.answer_model.as_str()));
        assert_eq!(request.messages.len(), 4);
        assert_eq!(request.messages[0].role, MessageRole::System);
        let system = request.messages[0].content.as_deref().unwrap();
        assert!(system.contains("<args>\nn = 2\n</args>"));
        assert_eq!(request.messages[3].content.as_deref(), Some("why?"));
        assert!(request.reasoning.is_some());
        assert!(request.tools.is_none());
    }

    #[tokio::test]
    async fn failed_request_is_completion_error() {
        let mut fx = Fixture::new(session(2, 1));
        fx.config.retry = crate::api::RetryConfig::disabled();
        fx.provider = ScriptedProvider::new().then_error("HTTP 400: bad request");
        let (result, _) = fx.run(&AnswerTool, json!({})).await;
        assert!(matches!(result, ToolResult::Error(ToolError::Completion(_))));
    }
}
