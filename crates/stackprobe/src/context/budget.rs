//! Token ceilings for each block of curated context.
//!
//! The answer prompt is assembled from independent blocks, each with its own
//! ceiling so one large block (a huge file, a long stack) cannot crowd the
//! others out:
//!
//! | Block | Default | Split |
//! |-------|---------|-------|
//! | Stack trace | 4 096 | truncated from the oldest end |
//! | Important frames | 40 000 | even share per frame, see [`FrameBudget`] |
//! | Code context | 20 000 | even share per file |
//! | `names` tool output | 4 096 | half locals, half globals |
//! | Current-file window (agent prompt) | 2 048 | around the current line |
//! | `file` search input | 60 000 | file content sent to the model |

/// Default stack-trace ceiling.
pub const DEFAULT_STACK_TRACE_TOKENS: usize = 4096;
/// Default ceiling shared by all important frames.
pub const DEFAULT_FRAME_CONTEXT_TOKENS: usize = 40_000;
/// Default ceiling shared by all code-context files.
pub const DEFAULT_CODE_CONTEXT_TOKENS: usize = 20_000;
/// Default ceiling for the `names` tool output.
pub const DEFAULT_NAMES_TOKENS: usize = 4096;
/// Default ceiling for the source window around the current line.
pub const DEFAULT_SOURCE_WINDOW_TOKENS: usize = 2048;
/// Default ceiling for file content sent to the search model.
pub const DEFAULT_FILE_SEARCH_TOKENS: usize = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBudgets {
    pub stack_trace_tokens: usize,
    pub frame_context_tokens: usize,
    pub code_context_tokens: usize,
    pub names_tokens: usize,
    pub source_window_tokens: usize,
    pub file_search_tokens: usize,
}

impl Default for ContextBudgets {
    fn default() -> Self {
        Self {
            stack_trace_tokens: DEFAULT_STACK_TRACE_TOKENS,
            frame_context_tokens: DEFAULT_FRAME_CONTEXT_TOKENS,
            code_context_tokens: DEFAULT_CODE_CONTEXT_TOKENS,
            names_tokens: DEFAULT_NAMES_TOKENS,
            source_window_tokens: DEFAULT_SOURCE_WINDOW_TOKENS,
            file_search_tokens: DEFAULT_FILE_SEARCH_TOKENS,
        }
    }
}

/// Per-frame split of the important-frames ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBudget {
    pub source_window: usize,
    pub function: usize,
    pub expressions: usize,
}

impl ContextBudgets {
    pub fn with_stack_trace_tokens(mut self, tokens: usize) -> Self {
        self.stack_trace_tokens = tokens;
        self
    }

    pub fn with_frame_context_tokens(mut self, tokens: usize) -> Self {
        self.frame_context_tokens = tokens;
        self
    }

    pub fn with_code_context_tokens(mut self, tokens: usize) -> Self {
        self.code_context_tokens = tokens;
        self
    }

    pub fn with_names_tokens(mut self, tokens: usize) -> Self {
        self.names_tokens = tokens;
        self
    }

    pub fn with_source_window_tokens(mut self, tokens: usize) -> Self {
        self.source_window_tokens = tokens;
        self
    }

    pub fn with_file_search_tokens(mut self, tokens: usize) -> Self {
        self.file_search_tokens = tokens;
        self
    }

    /// Share of the frame ceiling for each of `frames` important frames:
    /// a quarter for the source window, a quarter for arguments and return
    /// value, and the rest for gathered expressions.
    pub fn frame_share(&self, frames: usize) -> FrameBudget {
        let share = self.frame_context_tokens / frames.max(1);
        let quarter = share / 4;
        FrameBudget {
            source_window: quarter,
            function: quarter,
            expressions: share - 2 * quarter,
        }
    }

    /// Share of the code-context ceiling for each of `files` files.
    pub fn code_share(&self, files: usize) -> usize {
        self.code_context_tokens / files.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_share_splits_quarter_quarter_half() {
        let budgets = ContextBudgets::default();
        let share = budgets.frame_share(4);
        assert_eq!(
            share,
            FrameBudget {
                source_window: 2500,
                function: 2500,
                expressions: 5000,
            }
        );
    }

    #[test]
    fn shares_never_divide_by_zero() {
        let budgets = ContextBudgets::default().with_code_context_tokens(900);
        assert_eq!(budgets.code_share(0), 900);
        assert_eq!(budgets.frame_share(0).expressions, 20_000);
    }

    #[test]
    fn odd_shares_give_remainder_to_expressions() {
        let share = ContextBudgets::default()
            .with_frame_context_tokens(103)
            .frame_share(1);
        assert_eq!(share.source_window + share.function + share.expressions, 103);
        assert_eq!(share.expressions, 53);
    }
}
