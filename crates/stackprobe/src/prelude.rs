//! Common imports for driving an [`Agent`].
//!
//! ```ignore
//! use stackprobe::prelude::*;
//! ```

pub use crate::agent::{
    Agent, AgentConfig, AgentError, AgentEvent, CompositeEventHandler, EventHandler,
    FnEventHandler, LoggingHandler, NoopHandler,
};
pub use crate::api::{CompletionProvider, RetryConfig, ScriptedProvider};
pub use crate::context::{ContextBudgets, Truncator};
pub use crate::session::snapshot::{SnapshotDebugger, SnapshotError};
pub use crate::session::{Debugger, Direction, Frame, Session};
pub use crate::tools::{Tool, ToolResult, ToolSet, Trajectory, default_tools};
pub use crate::{ChatCompletion, ChatRequest, Message, OpenRouterClient, ToolCall};
