//! `args`: argument bindings of the current frame's function.

use super::core::{Tool, ToolContext, ToolFuture, no_arguments};
use super::result::{ToolResult, Trajectory};
use crate::ToolDef;
use crate::session::Session;
use serde_json::Value;

pub struct ArgsTool;

impl Tool for ArgsTool {
    fn name(&self) -> &'static str {
        "args"
    }

    fn definition(&self, _session: &Session) -> ToolDef {
        ToolDef::new(
            "args",
            "Prints the argument list of the current function. Equivalent to the \
             debugger 'args' command.",
            no_arguments(),
        )
    }

    /// Arguments never change within a turn, so one call per frame.
    fn is_active(&self, trajectory: &Trajectory, session: &Session) -> bool {
        !trajectory.has_result_in_frame(session.current_index(), |r| {
            matches!(r, ToolResult::Arguments { .. })
        })
    }

    fn run<'a>(&'a self, _arguments: Value, ctx: &'a mut ToolContext<'_>) -> ToolFuture<'a> {
        Box::pin(async move {
            let frame_index = ctx.session.current_index();
            ToolResult::Arguments {
                frame_index,
                values: ctx.session.debugger().arguments(frame_index),
            }
        })
    }
}
