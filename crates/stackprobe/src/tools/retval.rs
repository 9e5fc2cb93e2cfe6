//! `retval`: value returned by the current frame's function.

use super::core::{Tool, ToolContext, ToolFuture, no_arguments};
use super::result::{ToolResult, Trajectory};
use crate::ToolDef;
use crate::session::Session;
use serde_json::Value;

pub struct RetvalTool;

impl Tool for RetvalTool {
    fn name(&self) -> &'static str {
        "retval"
    }

    fn definition(&self, _session: &Session) -> ToolDef {
        ToolDef::new(
            "retval",
            "Returns the return value for the last return of the current function. \
             Equivalent to the debugger 'retval' command.",
            no_arguments(),
        )
    }

    fn is_active(&self, trajectory: &Trajectory, session: &Session) -> bool {
        !trajectory.has_result_in_frame(session.current_index(), |r| {
            matches!(r, ToolResult::ReturnValue { .. })
        })
    }

    fn run<'a>(&'a self, _arguments: Value, ctx: &'a mut ToolContext<'_>) -> ToolFuture<'a> {
        Box::pin(async move {
            let frame_index = ctx.session.current_index();
            ToolResult::ReturnValue {
                frame_index,
                value: ctx.session.debugger().return_value(frame_index),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::session;
    use crate::tools::testing::Fixture;
    use serde_json::json;

    #[tokio::test]
    async fn not_yet_returned() {
        let mut fx = Fixture::new(session(2, 1));
        let (_, text) = fx.run(&RetvalTool, json!({})).await;
        assert_eq!(text, "Not yet returned.");
    }

    #[tokio::test]
    async fn once_per_frame() {
        let mut fx = Fixture::new(session(2, 1));
        fx.record(&RetvalTool, json!({})).await;
        assert!(!RetvalTool.is_active(&fx.trajectory, &fx.session));
    }
}
