//! Exponential backoff for transient completion failures.
//!
//! Only rate limits, gateway errors, and network hiccups are retried. A
//! rejected request (400, 401, 403) fails immediately.

use super::{CompletionProvider, CompletionFuture};
use crate::{ChatCompletion, ChatRequest};
use std::time::Duration;
use tracing::warn;

/// Retry policy for model calls.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt. Zero disables retrying.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryConfig {
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (0-indexed), doubling each time
    /// up to `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Whether a provider error is worth retrying.
pub fn is_transient_error(error: &str) -> bool {
    if ["429", "500", "502", "503", "504"]
        .iter()
        .any(|s| error.contains(&format!("HTTP {s}")))
    {
        return true;
    }

    let lower = error.to_lowercase();
    ["request failed:", "connection reset", "timed out", "broken pipe"]
        .iter()
        .any(|p| lower.contains(p))
}

/// Send `request` through `provider`, retrying transient failures.
pub async fn complete_with_retry(
    provider: &dyn CompletionProvider,
    request: &ChatRequest,
    config: &RetryConfig,
) -> Result<ChatCompletion, String> {
    let mut attempt = 0;
    loop {
        let call: CompletionFuture<'_> = provider.complete(request);
        match call.await {
            Ok(completion) => return Ok(completion),
            Err(e) if attempt < config.max_retries && is_transient_error(&e) => {
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    "Transient model error (attempt {}/{}): {e}. Retrying in {delay:?}",
                    attempt + 1,
                    config.max_retries,
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
