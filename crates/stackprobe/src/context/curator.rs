//! Prompt assembly.
//!
//! Two system prompts are built here:
//!
//! - [`agent_prompt`] for tool selection: tool-calling rules plus the
//!   debugger state (stack trace, current frame, a window of the current
//!   file).
//! - [`answer_prompt`] for the final answer: the stack trace with the
//!   turn's origin frame marked, one block per important frame, and the
//!   merged code context gathered by `source` and `file` calls.
//!
//! Every block is measured against its own ceiling from
//! [`ContextBudgets`].

use super::budget::{ContextBudgets, FrameBudget};
use super::chunks::{self, CodeChunk};
use super::truncator::{TruncateUnit, Truncator};
use crate::session::Session;
use crate::tools::result::{ToolResult, Trajectory};
use std::collections::BTreeSet;
use tracing::debug;

const AGENT_SYSTEM_PROMPT: &str = "You are an AI assistant that helps users debug code. \
You are activated when the user's program throws an exception or hits a breakpoint. \
You will receive a query from the user about the state of their program at that breakpoint. \
Your job is to choose the best action. Call tools to find information that will help answer the user's query. \
Call functions.answer when you have enough information to answer.

<tool_calling>
You have tools (functions) that allow you to operate the debugger. \
Follow these rules when calling tools:
- DO NOT call a tool that you've used before with the same arguments, unless you're in a different frame.
- DO NOT use functions.file to get the definition of a function or class. Use functions.source instead.
- If the user is referring to, or asking for, information that is in your history, call functions.answer.
- If after attempting to gather information you are still unsure how to answer the query, call functions.answer.
- If the query is a greeting, or neither a question nor an instruction, call functions.answer.
- If the output of a function is empty or an error message, try calling the function again with DIFFERENT arguments OR try calling a different function.
- You MUST call functions.expression at least once. Use it to get the value of a variable or expression that you believe is relevant to the user's query.
- Call functions.args or functions.retval to understand the current state of the function call.
- Call functions.names to see which variables you can inspect.
- Call functions.source or functions.file to get context on relevant code (e.g. function definitions, dependencies, etc.).
- Call functions.move if you need to inspect a different function call in the stack trace.
- Call functions.answer when you have enough information to answer the user's query.
</tool_calling>

--

Below is information about the current state of your debugger:

<debugger_state>
This is the stack trace, with the most recent frame at the bottom:

<stack_trace>
{stack_trace}
</stack_trace>

This is the current frame, which determines the context of your tool calls:

<current_frame>
{current_frame}
</current_frame>

This is your position in the file associated with the current frame:

<current_file>
<path>
{current_path}
</path>
<code>
{current_code}
</code>
</current_file>
</debugger_state>

Use this information as context as you're calling tools to operate the debugger.";

const ANSWER_SYSTEM_PROMPT: &str = "You are an AI assistant called 'stackprobe' that helps users debug code. \
Your task is to answer the user's query about the state of their code at a breakpoint. \
You will have context on the stack trace at the breakpoint, including important frames, variable values, and source code. \
Use this context to answer the user's query.

<response_format>
1. Use markdown formatting to make your response more readable. DO NOT include a title in your response.
2. Focus on addressing the user's specific query. Be as brief as possible.
3. If relevant, cite specific frames, variable/expression values, files, or code blocks.
4. Display citations in an interesting way (e.g. leveraging tables, arrows, etc.) if you can. DO NOT overdo it.
5. Keep a terse and professional tone.
6. Keep your response brief and to the point.
</response_format>";

const ANSWER_CLOSING: &str =
    "Use the stack trace, important frames, and additional code context to answer the user's query.";

const SOURCE_UNAVAILABLE: &str = "Source is not available.";

// ── Shared blocks ──────────────────────────────────────────────────

/// Stack trace with `marked` prefixed by `> `, trimmed from the oldest end.
/// Frames are dropped whole so a source line never loses its header.
pub fn stack_trace(
    session: &mut Session,
    truncator: &Truncator,
    marked: usize,
    max_tokens: usize,
) -> String {
    let entries = session.stack_trace_entries(marked);
    let full = entries.join("\n");
    if truncator.count(&full) <= max_tokens {
        return full;
    }

    let mut kept: Vec<&str> = Vec::new();
    let mut used = 0;
    for entry in entries.iter().rev() {
        let cost = truncator.count(entry) + truncator.count("\n");
        if used + cost > max_tokens {
            break;
        }
        used += cost;
        kept.push(entry);
    }
    kept.push("...");
    kept.reverse();
    kept.join("\n")
}

/// Listing of the lines around the frame's current line that fit in
/// `max_tokens`. Returns the file path with the listing.
pub fn frame_window(
    session: &mut Session,
    truncator: &Truncator,
    index: usize,
    max_tokens: usize,
) -> Option<(String, String)> {
    let frame = session.frame(index)?.clone();
    let code = match session.source_file(&frame.path) {
        Ok(file) => {
            let lines: Vec<&str> = file.lines().iter().map(String::as_str).collect();
            let range = truncator.window_truncate(&lines, frame.line, max_tokens);
            session
                .format_lines(&frame.path, range, Some(frame.line))
                .unwrap_or_else(|_| SOURCE_UNAVAILABLE.to_string())
        }
        Err(e) => {
            debug!("No source for frame {index}: {e}");
            SOURCE_UNAVAILABLE.to_string()
        }
    };
    Some((frame.path, code))
}

// ── Agent prompt ───────────────────────────────────────────────────

/// System prompt for the tool-selection model, reflecting the cursor as it
/// is right now.
pub fn agent_prompt(session: &mut Session, truncator: &Truncator, budgets: &ContextBudgets) -> String {
    let current = session.current_index();
    let trace = stack_trace(session, truncator, current, budgets.stack_trace_tokens);
    let entry = session.format_stack_entry(current);
    let (path, code) = frame_window(session, truncator, current, budgets.source_window_tokens)
        .unwrap_or_default();
    AGENT_SYSTEM_PROMPT
        .replace("{stack_trace}", &trace)
        .replace("{current_frame}", &entry)
        .replace("{current_path}", &path)
        .replace("{current_code}", &code)
}

/// User message for a question. The first question of a chain carries the
/// breakpoint location; follow-ups are sent as asked.
pub fn user_prompt(session: &mut Session, query: &str, follow_up: bool) -> String {
    if follow_up {
        return query.to_string();
    }
    let entry = session.format_stack_entry(session.origin());
    format!("The program is paused here:\n\n<breakpoint>\n{entry}\n</breakpoint>\n\n{query}")
}

// ── Answer prompt ──────────────────────────────────────────────────

/// Origin frame plus every frame an information result was gathered in,
/// oldest first.
pub fn important_frames(session: &Session, trajectory: &Trajectory) -> Vec<usize> {
    let mut frames: BTreeSet<usize> = trajectory
        .results()
        .filter_map(ToolResult::frame_index)
        .collect();
    frames.insert(session.origin());
    frames.into_iter().filter(|&i| i < session.depth()).collect()
}

/// Code selections made by `source` and `file` calls.
pub fn code_chunks(session: &mut Session, trajectory: &Trajectory) -> Vec<CodeChunk> {
    let mut out = Vec::new();
    for result in trajectory.results() {
        match result {
            ToolResult::Source { definition, .. } => {
                if let Ok(file) = session.source_file(&definition.path) {
                    out.push(CodeChunk::new(file, definition.first_line..=definition.last_line()));
                }
            }
            ToolResult::FileSearch { path, ranges, .. } => {
                if let Ok(file) = session.source_file(path) {
                    out.extend(ranges.iter().map(|r| CodeChunk::from_range(file.clone(), *r)));
                }
            }
            _ => {}
        }
    }
    out
}

fn function_block(
    session: &Session,
    truncator: &Truncator,
    index: usize,
    results: &[&ToolResult],
    max_tokens: usize,
) -> Option<String> {
    let args = results.iter().find_map(|r| match r {
        ToolResult::Arguments { values, .. } => Some(values),
        _ => None,
    });
    let retval = results.iter().find_map(|r| match r {
        ToolResult::ReturnValue { value, .. } => Some(value),
        _ => None,
    });
    if args.is_none() && retval.is_none() {
        return None;
    }

    let name = session
        .frame(index)
        .map(|f| f.function.as_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("<lambda>");
    let half = max_tokens / 2;
    let mut block = format!(
        "This is information about the function associated with the frame:\n\n\
         <function>\n<name>\n{name}\n</name>\n"
    );
    if let Some(values) = args.filter(|v| !v.is_empty()) {
        let lines: Vec<String> = values.iter().map(|(n, v)| format!("{n} = {v}")).collect();
        let text = truncator.truncate_middle(&lines.join("\n"), half, TruncateUnit::Line);
        block.push_str(&format!("<args>\n{text}\n</args>\n"));
    }
    if let Some(Some(value)) = retval {
        let text = truncator.truncate_middle(value, half, TruncateUnit::Char);
        block.push_str(&format!("<return_value>\n{text}\n</return_value>\n"));
    }
    block.push_str("</function>");
    Some(block)
}

fn expression_block(truncator: &Truncator, results: &[&ToolResult], max_tokens: usize) -> Option<String> {
    let mut lines: Vec<String> = Vec::new();
    for result in results {
        if let ToolResult::Expression {
            expression,
            value: Ok(value),
            ..
        } = result
        {
            let line = format!("{expression} = {value}");
            if !lines.contains(&line) {
                lines.push(line);
            }
        }
    }
    if lines.is_empty() {
        return None;
    }
    let text = truncator.truncate_middle(&lines.join("\n"), max_tokens, TruncateUnit::Line);
    Some(format!(
        "These are the values of relevant variables and expressions in the frame:\n\n\
         <variables>\n{}\n</variables>",
        text.trim_end_matches('\n')
    ))
}

fn frame_block(
    session: &mut Session,
    truncator: &Truncator,
    trajectory: &Trajectory,
    index: usize,
    budget: FrameBudget,
) -> String {
    let results: Vec<&ToolResult> = trajectory
        .results()
        .filter(|r| r.frame_index() == Some(index))
        .collect();
    let prefix = if index == session.origin() { "> " } else { "  " };
    let entry = session.format_stack_entry(index);
    let mut block = format!("<frame>\n<stack_entry>\n{prefix}{entry}\n</stack_entry>");

    if let Some((path, code)) = frame_window(session, truncator, index, budget.source_window) {
        block.push_str(&format!(
            "\n\nThis is the file associated with the frame. The line of code is highlighted \
             with an arrow (->):\n\n<file>\n<path>\n{path}\n</path>\n<code>\n{code}\n</code>\n</file>"
        ));
    }
    if let Some(function) = function_block(session, truncator, index, &results, budget.function) {
        block.push_str("\n\n");
        block.push_str(&function);
    }
    if let Some(expressions) = expression_block(truncator, &results, budget.expressions) {
        block.push_str("\n\n");
        block.push_str(&expressions);
    }
    block.push_str("\n</frame>");
    block
}

fn code_context(
    session: &mut Session,
    truncator: &Truncator,
    trajectory: &Trajectory,
    budgets: &ContextBudgets,
    max_gap_fill: usize,
) -> Option<String> {
    let curated = chunks::curate(&code_chunks(session, trajectory), max_gap_fill);
    if curated.is_empty() {
        return None;
    }
    let share = budgets.code_share(curated.len());
    let files: Vec<String> = curated
        .iter()
        .map(|chunk| {
            let code = truncator.truncate_end(&chunk.render(true), share, TruncateUnit::Line);
            format!("<file>\n<path>\n{}\n</path>\n<code>\n{code}\n</code>\n</file>", chunk.path())
        })
        .collect();
    Some(format!(
        "This is additional context on the codebase and imported packages:\n\n\
         <code_context>\n{}\n</code_context>",
        files.join("\n\n")
    ))
}

/// System prompt for the answer model, built from everything in the
/// trajectory.
pub fn answer_prompt(
    session: &mut Session,
    trajectory: &Trajectory,
    truncator: &Truncator,
    budgets: &ContextBudgets,
    max_gap_fill: usize,
) -> String {
    let origin = session.origin();
    let mut sections = vec![ANSWER_SYSTEM_PROMPT.to_string()];

    let trace = stack_trace(session, truncator, origin, budgets.stack_trace_tokens);
    sections.push(format!(
        "This is the stack trace at the breakpoint (most recent frame at the bottom):\n\n\
         <stack_trace>\n{trace}\n</stack_trace>"
    ));

    let frames = important_frames(session, trajectory);
    if !frames.is_empty() {
        let budget = budgets.frame_share(frames.len());
        let blocks: Vec<String> = frames
            .iter()
            .map(|&i| frame_block(session, truncator, trajectory, i, budget))
            .collect();
        sections.push(format!(
            "These are the most important frames in the stack trace:\n\n\
             <important_frames>\n{}\n</important_frames>",
            blocks.join("\n\n")
        ));
    }

    if let Some(code) = code_context(session, truncator, trajectory, budgets, max_gap_fill) {
        sections.push(code);
    }

    sections.push(ANSWER_CLOSING.to_string());
    let prompt = sections.join("\n\n--\n\n");
    debug!(
        "Answer prompt: {} important frames, ~{} tokens",
        frames.len(),
        truncator.count(&prompt)
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::chunks::LineRange;
    use crate::session::snapshot::SnapshotDebugger;
    use crate::session::{Definition, Direction, EvalError};
    use crate::tools::result::TrajectoryEntry;
    use serde_json::json;

    fn session() -> Session {
        let source: Vec<String> = (1..=60).map(|i| format!("stmt_{i}()")).collect();
        let debugger = SnapshotDebugger::from_value(json!({
            "frames": [
                {"path": "app.py", "line": 10, "function": "main"},
                {"path": "app.py", "line": 40, "function": "handle",
                 "arguments": {"req": {"id": 7}}, "return_value": 3},
            ],
            "sources": {"app.py": source.join("\n")},
            "breakpoints": {"app.py": [40]}
        }))
        .unwrap();
        let mut session = Session::new(Box::new(debugger), true);
        session.begin_turn();
        session
    }

    fn push(trajectory: &mut Trajectory, tool: &str, result: ToolResult) {
        trajectory.push(TrajectoryEntry {
            call_id: format!("call_{}", trajectory.len() + 1),
            tool: tool.into(),
            arguments: json!({}),
            rendered: result.to_string(),
            result,
        });
    }

    #[test]
    fn agent_prompt_shows_current_frame_and_file() {
        let mut session = session();
        let prompt = agent_prompt(&mut session, &Truncator::default(), &ContextBudgets::default());
        assert!(prompt.contains("<current_frame>\napp.py(40)handle()\n-> stmt_40()\n</current_frame>"));
        assert!(prompt.contains(" 40 B->\tstmt_40()"));
        assert!(prompt.contains("> app.py(40)handle()"));
        assert!(!prompt.contains("{stack_trace}"));
    }

    #[test]
    fn stack_trace_drops_oldest_frames_first() {
        let mut session = session();
        let truncator = Truncator::default();
        let full = stack_trace(&mut session, &truncator, 1, 10_000);
        assert!(full.starts_with("  app.py(10)main()"));
        let tight = stack_trace(&mut session, &truncator, 1, 20);
        assert!(tight.starts_with("...\n> app.py(40)handle()"));
        assert!(tight.ends_with("-> stmt_40()"));
    }

    #[test]
    fn stack_trace_keeps_frames_whole() {
        let mut session = session();
        let truncator = Truncator::default();
        for budget in 0..40 {
            let trace = stack_trace(&mut session, &truncator, 1, budget);
            let lines: Vec<&str> = trace.lines().collect();
            for (i, line) in lines.iter().enumerate() {
                if line.starts_with("-> ") {
                    assert!(
                        i > 0 && lines[i - 1].ends_with("()"),
                        "source line without its frame at budget {budget}:\n{trace}"
                    );
                }
            }
        }
    }

    #[test]
    fn important_frames_include_origin_and_visited() {
        let mut session = session();
        let mut trajectory = Trajectory::new();
        push(
            &mut trajectory,
            "move",
            ToolResult::Moved {
                direction: Direction::Up,
                from: 1,
                frame_index: 0,
            },
        );
        assert_eq!(important_frames(&session, &trajectory), vec![1]);

        session.select(0).unwrap();
        push(
            &mut trajectory,
            "expression",
            ToolResult::Expression {
                frame_index: 0,
                expression: "x".into(),
                value: Ok("1".into()),
            },
        );
        assert_eq!(important_frames(&session, &trajectory), vec![0, 1]);
    }

    #[test]
    fn answer_prompt_sections() {
        let mut session = session();
        let mut trajectory = Trajectory::new();
        push(
            &mut trajectory,
            "args",
            ToolResult::Arguments {
                frame_index: 1,
                values: vec![("req".into(), "{'id': 7}".into())],
            },
        );
        push(
            &mut trajectory,
            "retval",
            ToolResult::ReturnValue {
                frame_index: 1,
                value: Some("3".into()),
            },
        );
        push(
            &mut trajectory,
            "expression",
            ToolResult::Expression {
                frame_index: 1,
                expression: "req.id".into(),
                value: Ok("7".into()),
            },
        );
        push(
            &mut trajectory,
            "expression",
            ToolResult::Expression {
                frame_index: 1,
                expression: "missing".into(),
                value: Err(EvalError::UnknownName("missing".into())),
            },
        );
        push(
            &mut trajectory,
            "file",
            ToolResult::FileSearch {
                frame_index: 1,
                path: "app.py".into(),
                ranges: vec![LineRange::new(20, 22), LineRange::new(30, 31)],
            },
        );
        push(
            &mut trajectory,
            "source",
            ToolResult::Source {
                frame_index: 1,
                object: "helper".into(),
                definition: Definition {
                    path: "app.py".into(),
                    first_line: 50,
                    lines: vec!["stmt_50()".into(), "stmt_51()".into()],
                },
            },
        );

        let prompt = answer_prompt(
            &mut session,
            &trajectory,
            &Truncator::default(),
            &ContextBudgets::default(),
            15,
        );
        assert!(prompt.contains("<stack_entry>\n> app.py(40)handle()\n-> stmt_40()\n</stack_entry>"));
        assert!(prompt.contains("<name>\nhandle\n</name>\n<args>\nreq = {'id': 7}\n</args>\n<return_value>\n3\n</return_value>"));
        assert!(prompt.contains("<variables>\nreq.id = 7\n</variables>"));
        assert!(!prompt.contains("missing ="));
        // 20-22 and 30-31 are bridged, 31 pulls in 15 lines toward 50.
        assert!(prompt.contains("22 stmt_22()\n23 stmt_23()"));
        assert!(prompt.contains("46 stmt_46()\n⋮...\n50 stmt_50()"));
        assert!(prompt.contains("60 stmt_60()\n</code>"));
        assert_eq!(prompt.matches("<code_context>").count(), 1);
        assert!(prompt.ends_with(ANSWER_CLOSING));
    }

    #[test]
    fn user_prompt_attaches_breakpoint_unless_follow_up() {
        let mut session = session();
        let first = user_prompt(&mut session, "why 3?", false);
        assert!(first.contains("<breakpoint>\napp.py(40)handle()\n-> stmt_40()\n</breakpoint>"));
        assert!(first.ends_with("why 3?"));
        assert_eq!(user_prompt(&mut session, "and then?", true), "and then?");
    }
}
