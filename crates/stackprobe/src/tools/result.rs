//! Tool results and the per-turn trajectory.

use crate::context::chunks::LineRange;
use crate::session::{Definition, Direction, EvalError, NavigationError, Names, ResourceError};
use crate::{Message, ToolCall};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Failure of a single tool call. Always fed back to the model as the
/// call's result; never aborts the turn.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    /// Unknown or inactive tool, or arguments that do not match the schema.
    #[error("Error: {0}")]
    Validation(String),
    /// A model request made by the tool failed after retries.
    #[error("Error: model request failed: {0}")]
    Completion(String),
}

/// Outcome of one tool call. Information variants carry the frame they
/// were gathered in.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Moved {
        direction: Direction,
        from: usize,
        frame_index: usize,
    },
    Arguments {
        frame_index: usize,
        values: Vec<(String, String)>,
    },
    Expression {
        frame_index: usize,
        expression: String,
        value: Result<String, EvalError>,
    },
    ReturnValue {
        frame_index: usize,
        value: Option<String>,
    },
    Source {
        frame_index: usize,
        object: String,
        definition: Definition,
    },
    FileSearch {
        frame_index: usize,
        path: String,
        ranges: Vec<LineRange>,
    },
    Names {
        frame_index: usize,
        names: Names,
    },
    Answer {
        text: String,
    },
    Error(ToolError),
}

impl ToolResult {
    /// Frame an information result was gathered in.
    pub fn frame_index(&self) -> Option<usize> {
        match self {
            ToolResult::Arguments { frame_index, .. }
            | ToolResult::Expression { frame_index, .. }
            | ToolResult::ReturnValue { frame_index, .. }
            | ToolResult::Source { frame_index, .. }
            | ToolResult::FileSearch { frame_index, .. }
            | ToolResult::Names { frame_index, .. } => Some(*frame_index),
            ToolResult::Moved { .. } | ToolResult::Answer { .. } | ToolResult::Error(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolResult::Error(_))
    }
}

impl From<ToolError> for ToolResult {
    fn from(error: ToolError) -> Self {
        ToolResult::Error(error)
    }
}

/// Fallback rendering. Tools that need session state to describe their
/// result override [`Tool::render`](super::core::Tool::render).
impl fmt::Display for ToolResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolResult::Moved {
                direction,
                frame_index,
                ..
            } => write!(f, "Moved {direction} the stack to frame {frame_index}."),
            ToolResult::Arguments { values, .. } => {
                if values.is_empty() {
                    return f.write_str("The current function takes no arguments.");
                }
                let lines: Vec<String> = values.iter().map(|(n, v)| format!("{n} = {v}")).collect();
                f.write_str(&lines.join("\n"))
            }
            ToolResult::Expression {
                expression, value, ..
            } => match value {
                Ok(v) => f.write_str(v),
                Err(e) => write!(f, "Failed to get the value of `{expression}`:\n\n{e}"),
            },
            ToolResult::ReturnValue { value, .. } => {
                f.write_str(value.as_deref().unwrap_or("Not yet returned."))
            }
            ToolResult::Source { definition, .. } => {
                let code: Vec<String> = definition
                    .lines
                    .iter()
                    .enumerate()
                    .map(|(i, line)| {
                        format!("{:>3}\t{}", definition.first_line + i, line.trim_end())
                    })
                    .collect();
                write!(
                    f,
                    "<file>{}</file>\n<code>\n{}\n</code>",
                    definition.path,
                    code.join("\n")
                )
            }
            ToolResult::FileSearch { path, ranges, .. } => {
                if ranges.is_empty() {
                    return f.write_str("No relevant code found.");
                }
                let ranges: Vec<String> = ranges.iter().map(LineRange::to_string).collect();
                write!(f, "Relevant lines in {path}: {}", ranges.join(", "))
            }
            ToolResult::Names { names, .. } => write!(
                f,
                "<locals>\n{}\n</locals>\n<globals>\n{}\n</globals>",
                names.locals.join("\n"),
                names.globals.join("\n")
            ),
            ToolResult::Answer { text } => f.write_str(text),
            ToolResult::Error(e) => write!(f, "{e}"),
        }
    }
}

// ── Trajectory ─────────────────────────────────────────────────────

/// One executed tool call.
#[derive(Debug, Clone)]
pub struct TrajectoryEntry {
    pub call_id: String,
    pub tool: String,
    pub arguments: Value,
    pub result: ToolResult,
    /// Text returned to the model for this call.
    pub rendered: String,
}

/// Ordered log of tool calls for the current question chain.
///
/// Entries from earlier questions of a follow-up chain stay visible to
/// answer curation. Replay and liveness only look at the current turn,
/// which starts at [`Trajectory::begin_turn`].
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    entries: Vec<TrajectoryEntry>,
    turn_start: usize,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: TrajectoryEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TrajectoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.turn_start = 0;
    }

    /// Mark the start of a new question. Later entries form the current turn.
    pub fn begin_turn(&mut self) {
        self.turn_start = self.entries.len();
    }

    /// Entries recorded since the last [`Trajectory::begin_turn`].
    pub fn current_turn(&self) -> &[TrajectoryEntry] {
        self.entries.get(self.turn_start..).unwrap_or_default()
    }

    pub fn results(&self) -> impl Iterator<Item = &ToolResult> {
        self.entries.iter().map(|e| &e.result)
    }

    /// Whether a result matching `kind` was already gathered in `frame`
    /// during the current turn.
    pub fn has_result_in_frame(&self, frame: usize, kind: impl Fn(&ToolResult) -> bool) -> bool {
        self.current_turn()
            .iter()
            .any(|e| e.result.frame_index() == Some(frame) && kind(&e.result))
    }

    /// Replay the current turn as assistant tool calls followed by their
    /// results, the shape chat APIs expect.
    pub fn to_messages(&self) -> Vec<Message> {
        let turn = self.current_turn();
        let mut messages = Vec::with_capacity(turn.len() * 2);
        for entry in turn {
            let arguments = if entry.arguments.is_null() {
                "{}".to_string()
            } else {
                entry.arguments.to_string()
            };
            messages.push(Message::assistant_tool_calls(vec![ToolCall::new(
                entry.call_id.clone(),
                entry.tool.clone(),
                arguments,
            )]));
            messages.push(Message::tool_result(entry.call_id.clone(), entry.rendered.clone()));
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MessageRole;
    use serde_json::json;

    fn entry(tool: &str, result: ToolResult) -> TrajectoryEntry {
        TrajectoryEntry {
            call_id: format!("call_{tool}"),
            tool: tool.to_string(),
            arguments: json!({}),
            rendered: result.to_string(),
            result,
        }
    }

    #[test]
    fn frame_index_only_for_information() {
        let moved = ToolResult::Moved {
            direction: Direction::Up,
            from: 2,
            frame_index: 1,
        };
        assert_eq!(moved.frame_index(), None);
        let args = ToolResult::Arguments {
            frame_index: 1,
            values: vec![],
        };
        assert_eq!(args.frame_index(), Some(1));
    }

    #[test]
    fn renders_fallbacks() {
        let retval = ToolResult::ReturnValue {
            frame_index: 0,
            value: None,
        };
        assert_eq!(retval.to_string(), "Not yet returned.");

        let failed = ToolResult::Expression {
            frame_index: 0,
            expression: "x.y".into(),
            value: Err(EvalError::UnknownName("x".into())),
        };
        assert_eq!(
            failed.to_string(),
            "Failed to get the value of `x.y`:\n\nNameError: name 'x' is not defined"
        );

        let source = ToolResult::Source {
            frame_index: 0,
            object: "f".into(),
            definition: Definition {
                path: "a.py".into(),
                first_line: 9,
                lines: vec!["def f():".into(), "    pass".into()],
            },
        };
        assert_eq!(
            source.to_string(),
            "<file>a.py</file>\n<code>\n  9\tdef f():\n 10\t    pass\n</code>"
        );
    }

    #[test]
    fn trajectory_replays_as_call_and_result_pairs() {
        let mut trajectory = Trajectory::new();
        trajectory.push(entry(
            "args",
            ToolResult::Arguments {
                frame_index: 3,
                values: vec![("n".into(), "1".into())],
            },
        ));
        let messages = trajectory.to_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::Assistant);
        assert_eq!(messages[1].role, MessageRole::Tool);
        assert_eq!(messages[1].content.as_deref(), Some("n = 1"));
        assert!(trajectory.has_result_in_frame(3, |r| matches!(r, ToolResult::Arguments { .. })));
        assert!(!trajectory.has_result_in_frame(2, |_| true));
    }

    #[test]
    fn new_turn_replays_only_its_own_calls() {
        let mut trajectory = Trajectory::new();
        trajectory.push(entry(
            "args",
            ToolResult::Arguments {
                frame_index: 3,
                values: vec![("n".into(), "1".into())],
            },
        ));
        trajectory.begin_turn();
        assert!(trajectory.to_messages().is_empty());
        assert!(!trajectory.has_result_in_frame(3, |r| matches!(r, ToolResult::Arguments { .. })));
        // Earlier results are still there for curation.
        assert_eq!(trajectory.results().count(), 1);

        trajectory.push(entry(
            "retval",
            ToolResult::ReturnValue {
                frame_index: 3,
                value: None,
            },
        ));
        let messages = trajectory.to_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].tool_call_id.as_deref(), Some("call_retval"));

        trajectory.clear();
        assert!(trajectory.current_turn().is_empty());
    }
}
