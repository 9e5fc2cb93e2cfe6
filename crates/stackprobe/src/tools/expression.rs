//! `expression`: evaluate an expression in the current frame.
//!
//! Evaluation failures come back as a normal result carrying the error so
//! the model can retry with a different expression.

use super::core::{Tool, ToolContext, ToolFuture, deserialize_arguments};
use super::result::ToolResult;
use crate::session::Session;
use crate::{ToolDef, json_schema_for};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
struct ExpressionArgs {
    /// Variable or expression to print. E.g. 'var_name', 'self.attribute' or 'len(items)'.
    expression: String,
}

pub struct ExpressionTool;

impl Tool for ExpressionTool {
    fn name(&self) -> &'static str {
        "expression"
    }

    fn definition(&self, _session: &Session) -> ToolDef {
        ToolDef::new(
            "expression",
            "Returns the value of a variable or expression. Equivalent to the debugger \
             'print' command. Supports names, attribute access, indexing and len().",
            json_schema_for::<ExpressionArgs>(),
        )
    }

    fn run<'a>(&'a self, arguments: Value, ctx: &'a mut ToolContext<'_>) -> ToolFuture<'a> {
        Box::pin(async move {
            let args: ExpressionArgs = match deserialize_arguments(self.name(), arguments) {
                Ok(a) => a,
                Err(e) => return e.into(),
            };
            let frame_index = ctx.session.current_index();
            let value = ctx.session.debugger().evaluate(frame_index, &args.expression);
            if let Err(e) = &value {
                debug!("Evaluating `{}` failed: {e}", args.expression);
            }
            ToolResult::Expression {
                frame_index,
                expression: args.expression,
                value,
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

    #[test]
    fn schema_rejects_extra_fields() {
        let def = ExpressionTool.definition(&session(1, 0));
        assert_eq!(def.function.parameters["additionalProperties"], json!(false));
        assert_eq!(def.function.parameters["required"], json!(["expression"]));
    }

    #[tokio::test]
    async fn evaluates_in_current_frame() {
        let mut fx = Fixture::new(session(3, 2));
        let (_, text) = fx.run(&ExpressionTool, json!({"expression": "value"})).await;
        assert_eq!(text, "20");
    }

    #[tokio::test]
    async fn failure_is_reported_for_retry() {
        let mut fx = Fixture::new(session(3, 2));
        let (result, text) = fx.run(&ExpressionTool, json!({"expression": "nope"})).await;
        assert!(!result.is_error());
        assert_eq!(
            text,
            "Failed to get the value of `nope`:\n\nNameError: name 'nope' is not defined"
        );
    }
}
