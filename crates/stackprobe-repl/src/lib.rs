//! Interactive debugger prompt for `stackprobe`.
//!
//! Loads a JSON stack snapshot, then reads commands from stdin: pdb-style
//! navigation (`up`, `down`, `where`, `p`) plus `ask` for questions to the
//! agent.
//!
//! ```sh
//! # Interactive
//! stackprobe stack.json
//!
//! # One question, then exit
//! stackprobe stack.json --query "why is total negative?"
//!
//! # No network: canned model replies, useful for inspecting prompts with -vv
//! stackprobe stack.json --offline -vv
//! ```

pub mod commands;
pub mod repl;

pub use commands::Command;
pub use repl::{Repl, Step, load_session};
