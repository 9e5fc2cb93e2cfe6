//! `move`: walk the cursor up or down the stack.

use super::core::{
    EXPLANATION_DESCRIPTION, Tool, ToolContext, ToolFuture, deserialize_arguments, object_schema,
};
use super::result::{ToolError, ToolResult, Trajectory};
use crate::ToolDef;
use crate::session::navigator::{self, Direction};
use crate::session::Session;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
struct MoveArgs {
    direction: Direction,
}

pub struct MoveTool;

impl Tool for MoveTool {
    fn name(&self) -> &'static str {
        "move"
    }

    /// The `direction` enum only lists moves that would succeed.
    fn definition(&self, session: &Session) -> ToolDef {
        let legal: Vec<&str> = navigator::legal_directions(session)
            .into_iter()
            .map(Direction::as_str)
            .collect();
        ToolDef::new(
            "move",
            "Moves the current frame up or down the stack trace. Equivalent to the \
             debugger 'up' or 'down' command.",
            object_schema(
                json!({
                    "explanation": {
                        "type": "string",
                        "description": EXPLANATION_DESCRIPTION,
                    },
                    "direction": {
                        "type": "string",
                        "enum": legal,
                        "description": "Direction to move in the stack trace. 'up' moves to \
                                        an older frame, 'down' moves to a newer frame.",
                    },
                }),
                &["explanation", "direction"],
            ),
        )
    }

    fn is_active(&self, _trajectory: &Trajectory, session: &Session) -> bool {
        !navigator::legal_directions(session).is_empty()
    }

    fn run<'a>(&'a self, arguments: Value, ctx: &'a mut ToolContext<'_>) -> ToolFuture<'a> {
        Box::pin(async move {
            let args: MoveArgs = match deserialize_arguments(self.name(), arguments) {
                Ok(a) => a,
                Err(e) => return e.into(),
            };
            let from = ctx.session.current_index();
            match navigator::move_frame(ctx.session, args.direction) {
                Ok(frame_index) => ToolResult::Moved {
                    direction: args.direction,
                    from,
                    frame_index,
                },
                Err(e) => ToolError::from(e).into(),
            }
        })
    }

    fn render(&self, result: &ToolResult, ctx: &mut ToolContext<'_>) -> String {
        match result {
            ToolResult::Moved {
                direction,
                frame_index,
                ..
            } => format!(
                "Moved {direction} the stack to this frame:\n\n<frame>\n> {}\n</frame>",
                ctx.session.format_stack_entry(*frame_index)
            ),
            other => other.to_string(),
        }
    }
}
