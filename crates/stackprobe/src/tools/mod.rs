//! Debugger tools offered to the model.
//!
//! | Tool | Kind | Effect |
//! |------|------|--------|
//! | `move` | navigation | moves the cursor up or down the stack |
//! | `args` | information | argument bindings of the current frame |
//! | `retval` | information | return value of the current frame |
//! | `expression` | information | evaluates an expression in the current frame |
//! | `source` | information | source of a function, class or module |
//! | `names` | information | local and global names of the current frame |
//! | `file` | information | model-driven search of the current file |
//! | `answer` | terminal | produces the final answer |

pub mod answer;
pub mod args;
pub mod core;
pub mod expression;
pub mod file_search;
pub mod move_frame;
pub mod names;
pub mod result;
pub mod retval;
pub mod source;

pub use answer::{ANSWER_TOOL_NAME, AnswerTool};
pub use args::ArgsTool;
pub use core::{Tool, ToolContext, ToolFuture, ToolSet};
pub use expression::ExpressionTool;
pub use file_search::FileSearchTool;
pub use move_frame::MoveTool;
pub use names::NamesTool;
pub use result::{ToolError, ToolResult, Trajectory, TrajectoryEntry};
pub use retval::RetvalTool;
pub use source::SourceTool;

use crate::agent::config::AgentConfig;

/// The standard tool set, in the order the tools are offered.
pub fn default_tools(config: &AgentConfig) -> ToolSet {
    ToolSet::new()
        .with(MoveTool)
        .with(ArgsTool)
        .with(RetvalTool)
        .with(ExpressionTool)
        .with(SourceTool)
        .with(NamesTool)
        .with_if(config.file_search, FileSearchTool)
        .with(AnswerTool)
}
