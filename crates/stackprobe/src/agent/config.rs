//! Configuration for the [`Agent`](super::harness::Agent).
//!
//! # Examples
//!
//! Defaults, overridden from the environment:
//!
//! ```ignore
//! let config = AgentConfig::from_env();
//! ```
//!
//! Builder methods for the settings callers routinely change:
//!
//! ```ignore
//! let config = AgentConfig::default()
//!     .with_agent_model("openai/gpt-4.1-mini")
//!     .with_max_depth(10)
//!     .with_show_progress(false);
//! ```
//!
//! Token ceilings live in [`ContextBudgets`] and are set through the
//! `budgets` field:
//!
//! ```ignore
//! let config = AgentConfig {
//!     budgets: ContextBudgets::default().with_code_context_tokens(8_000),
//!     ..AgentConfig::default()
//! };
//! ```

use crate::DEFAULT_MODEL;
use crate::api::retry::RetryConfig;
use crate::context::budget::ContextBudgets;
use crate::context::chunks::{DEFAULT_MAX_GAP_FILL, DEFAULT_RANGE_MERGE_DISTANCE};
use tracing::warn;

/// Default maximum number of tool-selection rounds per question.
pub const DEFAULT_MAX_DEPTH: u32 = 25;
/// Default per-response token limit.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
/// Default reasoning budget for the answer model.
pub const DEFAULT_THINKING_TOKENS: u32 = 2048;

/// Environment variable overriding [`AgentConfig::agent_model`].
pub const ENV_AGENT_MODEL: &str = "STACKPROBE_AGENT_MODEL";
/// Environment variable overriding [`AgentConfig::answer_model`].
pub const ENV_ANSWER_MODEL: &str = "STACKPROBE_ANSWER_MODEL";
/// Environment variable overriding [`AgentConfig::max_depth`].
pub const ENV_MAX_DEPTH: &str = "STACKPROBE_MAX_DEPTH";
/// Environment variable overriding [`AgentConfig::hide_external_frames`].
pub const ENV_HIDE_EXTERNAL_FRAMES: &str = "STACKPROBE_HIDE_EXTERNAL_FRAMES";

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model that picks tools and searches files.
    pub agent_model: String,
    /// Model that writes the final answer.
    pub answer_model: String,
    /// Maximum tool-selection rounds before the answer is forced.
    pub max_depth: u32,
    /// Skip library and runtime frames when navigating.
    pub hide_external_frames: bool,
    /// Draw a spinner on stderr while waiting for the model.
    pub show_progress: bool,
    /// Maximum tokens per model response.
    pub max_tokens: u32,
    pub temperature: f32,
    /// Reasoning budget for the answer model. `0` disables reasoning.
    pub thinking_tokens: u32,
    /// Largest gap between selected lines that code context bridges.
    pub max_gap_fill: usize,
    /// Largest gap between search ranges that gets fused.
    pub range_merge_distance: usize,
    pub budgets: ContextBudgets,
    /// Offer the `file` search tool.
    pub file_search: bool,
    pub retry: RetryConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_model: DEFAULT_MODEL.to_string(),
            answer_model: DEFAULT_MODEL.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            hide_external_frames: true,
            show_progress: true,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.0,
            thinking_tokens: DEFAULT_THINKING_TOKENS,
            max_gap_fill: DEFAULT_MAX_GAP_FILL,
            range_merge_distance: DEFAULT_RANGE_MERGE_DISTANCE,
            budgets: ContextBudgets::default(),
            file_search: true,
            retry: RetryConfig::default(),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl AgentConfig {
    /// Defaults overridden by the `STACKPROBE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the
    /// `STACKPROBE_*` keys. Unparseable values are ignored with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(model) = lookup(ENV_AGENT_MODEL).filter(|m| !m.trim().is_empty()) {
            config.agent_model = model;
        }
        if let Some(model) = lookup(ENV_ANSWER_MODEL).filter(|m| !m.trim().is_empty()) {
            config.answer_model = model;
        }
        if let Some(raw) = lookup(ENV_MAX_DEPTH) {
            match raw.trim().parse::<u32>() {
                Ok(depth) => config.max_depth = depth,
                Err(e) => warn!("Ignoring {ENV_MAX_DEPTH}={raw:?}: {e}"),
            }
        }
        if let Some(raw) = lookup(ENV_HIDE_EXTERNAL_FRAMES) {
            match parse_flag(&raw) {
                Some(flag) => config.hide_external_frames = flag,
                None => warn!("Ignoring {ENV_HIDE_EXTERNAL_FRAMES}={raw:?}: expected a boolean"),
            }
        }
        config
    }

    /// Use one model for both tool selection and answers.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.agent_model = model.clone();
        self.answer_model = model;
        self
    }

    pub fn with_agent_model(mut self, model: impl Into<String>) -> Self {
        self.agent_model = model.into();
        self
    }

    pub fn with_answer_model(mut self, model: impl Into<String>) -> Self {
        self.answer_model = model.into();
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_hide_external_frames(mut self, hide: bool) -> Self {
        self.hide_external_frames = hide;
        self
    }

    pub fn with_show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_thinking_tokens(mut self, tokens: u32) -> Self {
        self.thinking_tokens = tokens;
        self
    }

    pub fn with_file_search(mut self, enabled: bool) -> Self {
        self.file_search = enabled;
        self
    }

    /// Retry transient model failures up to `max_retries` times. `0`
    /// disables retries.
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.retry = RetryConfig {
            max_retries,
            ..self.retry
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.max_depth, 25);
        assert_eq!(config.thinking_tokens, 2048);
        assert_eq!(config.max_gap_fill, 15);
        assert_eq!(config.range_merge_distance, 10);
        assert!(config.hide_external_frames);
        assert!(config.file_search);
        assert_eq!(config.agent_model, DEFAULT_MODEL);
    }

    #[test]
    fn environment_overrides() {
        let config = AgentConfig::from_lookup(lookup(&[
            (ENV_AGENT_MODEL, "openai/gpt-4.1-mini"),
            (ENV_MAX_DEPTH, "7"),
            (ENV_HIDE_EXTERNAL_FRAMES, "off"),
        ]));
        assert_eq!(config.agent_model, "openai/gpt-4.1-mini");
        assert_eq!(config.answer_model, DEFAULT_MODEL);
        assert_eq!(config.max_depth, 7);
        assert!(!config.hide_external_frames);
    }

    #[test]
    fn bad_values_keep_defaults() {
        let config = AgentConfig::from_lookup(lookup(&[
            (ENV_MAX_DEPTH, "lots"),
            (ENV_HIDE_EXTERNAL_FRAMES, "maybe"),
            (ENV_ANSWER_MODEL, "  "),
        ]));
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert!(config.hide_external_frames);
        assert_eq!(config.answer_model, DEFAULT_MODEL);
    }

    #[test]
    fn builders() {
        let config = AgentConfig::default()
            .with_model("m")
            .with_max_depth(3)
            .with_retries(0)
            .with_file_search(false);
        assert_eq!(config.agent_model, "m");
        assert_eq!(config.answer_model, "m");
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.retry.max_retries, 0);
        assert!(!config.file_search);
    }
}
