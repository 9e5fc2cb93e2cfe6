//! In-memory [`CompletionProvider`] that replays queued responses.
//!
//! Used by the test suite and by the REPL's `--offline` mode. Every request
//! is recorded so tests can assert on the prompts and tool sets the agent
//! offered.

use super::{CompletionFuture, CompletionProvider};
use crate::{ChatCompletion, ChatRequest, ToolCall};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays completions in FIFO order.
///
/// When the queue is empty, the fallback (if any) is returned for every
/// further request; otherwise the provider reports exhaustion as an error.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    queue: Mutex<VecDeque<Result<ChatCompletion, String>>>,
    fallback: Option<ChatCompletion>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a completion.
    pub fn then(self, completion: ChatCompletion) -> Self {
        self.push(Ok(completion));
        self
    }

    /// Queue a text-only completion.
    pub fn then_text(self, text: impl Into<String>) -> Self {
        self.then(ChatCompletion::text(text))
    }

    /// Queue a completion with a single tool call.
    pub fn then_tool(self, name: &str, arguments: serde_json::Value) -> Self {
        let id = format!("call_{}", self.pending() + 1);
        self.then(ChatCompletion::tool_calls(vec![ToolCall::new(
            id,
            name,
            arguments.to_string(),
        )]))
    }

    /// Queue a provider failure.
    pub fn then_error(self, error: impl Into<String>) -> Self {
        self.push(Err(error.into()));
        self
    }

    /// Completion returned once the queue is drained.
    pub fn with_fallback(mut self, completion: ChatCompletion) -> Self {
        self.fallback = Some(completion);
        self
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Number of queued responses not yet consumed.
    pub fn pending(&self) -> usize {
        self.queue.lock().map_or(0, |q| q.len())
    }

    fn push(&self, entry: Result<ChatCompletion, String>) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(entry);
        }
    }

    fn next(&self, request: &ChatRequest) -> Result<ChatCompletion, String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let queued = self
            .queue
            .lock()
            .map_err(|_| "scripted provider poisoned".to_string())?
            .pop_front();
        match (queued, &self.fallback) {
            (Some(entry), _) => entry,
            (None, Some(fallback)) => Ok(fallback.clone()),
            (None, None) => Err("scripted provider exhausted".to_string()),
        }
    }
}

impl CompletionProvider for ScriptedProvider {
    fn complete<'a>(&'a self, request: &'a ChatRequest) -> CompletionFuture<'a> {
        let result = self.next(request);
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_in_order_then_exhausts() {
        let provider = ScriptedProvider::new()
            .then_tool("args", serde_json::json!({}))
            .then_text("done");
        let req = ChatRequest::default();

        let first = provider.complete(&req).await.unwrap();
        assert_eq!(first.tool_calls[0].function.name, "args");
        assert_eq!(first.tool_calls[0].id, "call_1");

        let second = provider.complete(&req).await.unwrap();
        assert_eq!(second.content.as_deref(), Some("done"));

        assert!(provider.complete(&req).await.is_err());
        assert_eq!(provider.requests().len(), 3);
    }

    #[tokio::test]
    async fn fallback_after_queue() {
        let provider = ScriptedProvider::new().with_fallback(ChatCompletion::text("again"));
        let req = ChatRequest::default();
        for _ in 0..3 {
            let c = provider.complete(&req).await.unwrap();
            assert_eq!(c.content.as_deref(), Some("again"));
        }
    }
}
