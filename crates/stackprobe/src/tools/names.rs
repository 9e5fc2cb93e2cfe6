//! `names`: local and global names bound in the current frame.

use super::core::{EXPLANATION_DESCRIPTION, Tool, ToolContext, ToolFuture, object_schema};
use super::result::{ToolResult, Trajectory};
use crate::ToolDef;
use crate::context::truncator::TruncateUnit;
use crate::session::Session;
use serde_json::{Value, json};

pub struct NamesTool;

impl Tool for NamesTool {
    fn name(&self) -> &'static str {
        "names"
    }

    fn definition(&self, _session: &Session) -> ToolDef {
        ToolDef::new(
            "names",
            "Returns all the local and global variable names in the current frame. Use this \
             to see what variables, functions, classes, etc. you can inspect the values of.",
            object_schema(
                json!({
                    "explanation": {
                        "type": "string",
                        "description": EXPLANATION_DESCRIPTION,
                    },
                }),
                &["explanation"],
            ),
        )
    }

    fn is_active(&self, trajectory: &Trajectory, session: &Session) -> bool {
        !trajectory.has_result_in_frame(session.current_index(), |r| {
            matches!(r, ToolResult::Names { .. })
        })
    }

    fn run<'a>(&'a self, _arguments: Value, ctx: &'a mut ToolContext<'_>) -> ToolFuture<'a> {
        Box::pin(async move {
            let frame_index = ctx.session.current_index();
            ToolResult::Names {
                frame_index,
                names: ctx.session.debugger().names(frame_index),
            }
        })
    }

    /// Each list gets half of the names budget.
    fn render(&self, result: &ToolResult, ctx: &mut ToolContext<'_>) -> String {
        let ToolResult::Names { frame_index, names } = result else {
            return result.to_string();
        };
        let half = ctx.config.budgets.names_tokens / 2;
        let locals = ctx
            .truncator
            .truncate_end(&names.locals.join("\n"), half, TruncateUnit::Line);
        let globals = ctx
            .truncator
            .truncate_end(&names.globals.join("\n"), half, TruncateUnit::Line);
        format!(
            "<frame>\n{}\n</frame>\n\nDefined names in the current frame:\n\n\
             <locals>\n{locals}\n</locals>\n<globals>\n{globals}\n</globals>",
            ctx.session.format_stack_entry(*frame_index)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::session;
    use crate::tools::testing::Fixture;

    #[tokio::test]
    async fn renders_frame_and_both_scopes() {
        let mut fx = Fixture::new(session(2, 1));
        let (_, text) = fx.run(&NamesTool, json!({"explanation": "look around"})).await;
        assert_eq!(
            text,
            "<frame>\n/app/mod1.py(2)f1()\n-> value = compute()\n</frame>\n\n\
             Defined names in the current frame:\n\n\
             <locals>\nn\nvalue\n</locals>\n<globals>\ncompute\n</globals>"
        );
    }

    #[tokio::test]
    async fn long_lists_are_truncated() {
        let mut fx = Fixture::new(session(2, 1));
        fx.config.budgets.names_tokens = 4;
        let result = ToolResult::Names {
            frame_index: 1,
            names: crate::session::Names {
                locals: (0..50).map(|i| format!("local_{i}")).collect(),
                globals: vec![],
            },
        };
        let mut ctx = fx.ctx();
        let text = NamesTool.render(&result, &mut ctx);
        assert!(text.contains("..."));
        assert!(!text.contains("local_49"));
    }
}
