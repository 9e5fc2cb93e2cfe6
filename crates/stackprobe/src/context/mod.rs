//! Turning session state into token-bounded prompt text.
//!
//! - [`tokenizer`]: the token counting capability.
//! - [`truncator`]: end, middle and window truncation under a ceiling.
//! - [`chunks`]: source files and the code-chunk algebra.
//! - [`budget`]: per-block token ceilings.
//! - [`curator`]: assembles the agent and answer system prompts.

pub mod budget;
pub mod chunks;
pub mod curator;
pub mod tokenizer;
pub mod truncator;

pub use budget::{ContextBudgets, FrameBudget};
pub use chunks::{CodeChunk, LineRange, SourceFile};
pub use tokenizer::{HeuristicTokenizer, Tokenizer};
pub use truncator::{ELLIPSIS_OVERHEAD, TruncateUnit, Truncator};
