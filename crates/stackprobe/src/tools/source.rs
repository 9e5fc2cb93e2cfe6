//! `source`: source code of a function, class or module.

use super::core::{Tool, ToolContext, ToolFuture, deserialize_arguments};
use super::result::{ToolError, ToolResult};
use crate::session::Session;
use crate::{ToolDef, json_schema_for};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
struct SourceArgs {
    /// The name of the object.
    object: String,
}

pub struct SourceTool;

impl Tool for SourceTool {
    fn name(&self) -> &'static str {
        "source"
    }

    fn definition(&self, _session: &Session) -> ToolDef {
        ToolDef::new(
            "source",
            "Returns the source code for an object. This can be a function, class, \
             method or module. Equivalent to the debugger 'source' command.",
            json_schema_for::<SourceArgs>(),
        )
    }

    fn run<'a>(&'a self, arguments: Value, ctx: &'a mut ToolContext<'_>) -> ToolFuture<'a> {
        Box::pin(async move {
            let args: SourceArgs = match deserialize_arguments(self.name(), arguments) {
                Ok(a) => a,
                Err(e) => return e.into(),
            };
            let frame_index = ctx.session.current_index();
            match ctx.session.debugger().definition(frame_index, &args.object) {
                Ok(definition) => ToolResult::Source {
                    frame_index,
                    object: args.object,
                    definition,
                },
                Err(e) => ToolError::from(e).into(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::snapshot::SnapshotDebugger;
    use crate::tools::testing::Fixture;
    use serde_json::json;

    fn fixture() -> Fixture {
        let debugger = SnapshotDebugger::from_value(json!({
            "frames": [{"path": "calc.py", "line": 5, "function": "main", "locals": {"n": 3}}],
            "sources": {"calc.py": "import math\n\ndef area(r):\n    return math.pi * r * r\n\nprint(area(2))\n"},
            "definitions": {"area": {"path": "calc.py", "line": 3, "end_line": 4}}
        }))
        .unwrap();
        Fixture::new(Session::new(Box::new(debugger), true))
    }

    #[tokio::test]
    async fn renders_numbered_definition() {
        let mut fx = fixture();
        let (result, text) = fx.run(&SourceTool, json!({"object": "area"})).await;
        assert_eq!(result.frame_index(), Some(0));
        assert_eq!(
            text,
            "<file>calc.py</file>\n<code>\n  3\tdef area(r):\n  4\t    return math.pi * r * r\n</code>"
        );
    }

    #[tokio::test]
    async fn unknown_object() {
        let mut fx = fixture();
        let (result, text) = fx.run(&SourceTool, json!({"object": "volume"})).await;
        assert!(result.is_error());
        assert_eq!(text, "There is no object named `volume` in the current frame.");
    }

    #[tokio::test]
    async fn value_without_source() {
        let mut fx = fixture();
        let (_, text) = fx.run(&SourceTool, json!({"object": "n"})).await;
        assert!(text.starts_with("Could not retrieve source code for `n`:"));
    }
}
