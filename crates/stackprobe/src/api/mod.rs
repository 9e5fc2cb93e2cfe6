//! Model access: the [`CompletionProvider`] seam, retry with backoff, and a
//! scripted provider for tests and offline demos.
//!
//! The agent never talks to HTTP directly. Everything it needs from a model
//! is one request/response exchange, expressed as a [`ChatRequest`] in and a
//! [`ChatCompletion`] out:
//!
//! - [`OpenRouterClient`] implements the trait over the OpenRouter API.
//! - [`scripted::ScriptedProvider`] replays queued completions and records
//!   every request it received.
//! - [`retry`] wraps any provider call with exponential backoff for
//!   transient failures.

pub mod retry;
pub mod scripted;

use crate::{ChatCompletion, ChatRequest, OpenRouterClient};
use std::future::Future;
use std::pin::Pin;

pub use retry::RetryConfig;
pub use scripted::ScriptedProvider;

/// Boxed future returned by [`CompletionProvider::complete`].
pub type CompletionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ChatCompletion, String>> + Send + 'a>>;

/// Something that can answer a chat completion request.
///
/// Errors are plain strings in the same shape the HTTP client produces
/// (`"OpenRouter API HTTP 429: ..."`), so [`retry::is_transient_error`] can
/// classify them regardless of the implementation.
pub trait CompletionProvider: Send + Sync {
    fn complete<'a>(&'a self, request: &'a ChatRequest) -> CompletionFuture<'a>;
}

impl CompletionProvider for OpenRouterClient {
    fn complete<'a>(&'a self, request: &'a ChatRequest) -> CompletionFuture<'a> {
        Box::pin(self.chat(request))
    }
}
