//! Agent runtime.
//!
//! - [`harness::Agent`]: the question-answering loop. Start here.
//! - [`config::AgentConfig`]: models, depth limit, token budgets.
//! - [`events`]: [`EventHandler`] and [`AgentEvent`] for observing a turn.

pub mod config;
pub mod events;
pub mod harness;

pub use config::AgentConfig;
pub use events::{
    AgentEvent, CompositeEventHandler, EventHandler, FnEventHandler, LoggingHandler, NoopHandler,
};
pub use harness::{Agent, AgentError};
