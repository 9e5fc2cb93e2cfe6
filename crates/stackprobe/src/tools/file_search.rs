//! `file`: semantic search over the current frame's file.
//!
//! The search itself is a second model call: the file content (numbered,
//! truncated to the file-search budget) and the query go out with a strict
//! JSON-schema response format, and the line ranges that come back are
//! clamped to the file and fused when close together.

use super::core::{
    EXPLANATION_DESCRIPTION, Tool, ToolContext, ToolFuture, deserialize_arguments, object_schema,
};
use super::result::{ToolError, ToolResult};
use crate::api::retry::complete_with_retry;
use crate::context::chunks::{self, ProposedRange, SourceFile};
use crate::context::truncator::TruncateUnit;
use crate::session::Session;
use crate::{ChatRequest, Message, ResponseFormat, ToolDef};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

/// Name of the structured response format sent with the search request.
pub const RESPONSE_FORMAT_NAME: &str = "file_chunks_response";

const SEARCH_PROMPT: &str = "I want to find all the code in a file that's relevant to a query. \
You'll be given the file content and a query. \
Your job is to return a list of code chunks that are relevant to the query.

Each chunk should be a line range, which is an object with \"first\" and \"last\" keys. \
\"first\" is the first line number of the chunk and \"last\" is the last line number, both inclusive. \
Every line of the file content is prefixed with its line number.

--

Here is the file path and content:

<path>{path}</path>
<content>
{content}
</content>

And here is the query:

<query>
{query}
</query>";

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
}

#[derive(Debug, Deserialize)]
struct ChunksResponse {
    chunks: Vec<ProposedRange>,
}

/// Strict schema for the search model's reply.
pub fn response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "chunks": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "first": {
                            "type": "integer",
                            "description": "The first line number of the chunk (inclusive).",
                        },
                        "last": {
                            "type": "integer",
                            "description": "The last line number of the chunk (inclusive).",
                        },
                    },
                    "required": ["first", "last"],
                    "additionalProperties": false,
                },
                "description": "List of code chunks that are relevant to the query. \
                                Each chunk should be denoted by a line range.",
            },
        },
        "required": ["chunks"],
        "additionalProperties": false,
    })
}

fn numbered(file: &SourceFile) -> String {
    file.lines()
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{} {}", i + 1, line.trim_end()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse the model's reply, tolerating a Markdown code fence around it.
fn parse_ranges(content: &str) -> Option<Vec<ProposedRange>> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str::<ChunksResponse>(body.trim())
        .ok()
        .map(|r| r.chunks)
}

pub struct FileSearchTool;

impl Tool for FileSearchTool {
    fn name(&self) -> &'static str {
        "file"
    }

    fn definition(&self, _session: &Session) -> ToolDef {
        ToolDef::new(
            "file",
            "Searches the content of the current file semantically. Returns the most \
             relevant code snippets from the file. Use 'source' instead to get the \
             definition of a function or class.",
            object_schema(
                json!({
                    "explanation": {
                        "type": "string",
                        "description": EXPLANATION_DESCRIPTION,
                    },
                    "query": {
                        "type": "string",
                        "description": "The search query. Should consist of keywords, e.g. \
                                        'auth handler', 'database connection', 'error \
                                        handling functions', etc.",
                    },
                }),
                &["explanation", "query"],
            ),
        )
    }

    fn run<'a>(&'a self, arguments: Value, ctx: &'a mut ToolContext<'_>) -> ToolFuture<'a> {
        Box::pin(async move {
            let args: SearchArgs = match deserialize_arguments(self.name(), arguments) {
                Ok(a) => a,
                Err(e) => return e.into(),
            };
            let frame_index = ctx.session.current_index();
            let Some(path) = ctx.session.current_frame().map(|f| f.path.clone()) else {
                return ToolError::Validation("there is no current frame".into()).into();
            };
            let file = match ctx.session.source_file(&path) {
                Ok(f) => f,
                Err(e) => return ToolError::from(e).into(),
            };

            let content = ctx.truncator.truncate_end(
                &numbered(&file),
                ctx.config.budgets.file_search_tokens,
                TruncateUnit::Line,
            );
            let prompt = SEARCH_PROMPT
                .replace("{path}", &path)
                .replace("{content}", &content)
                .replace("{query}", &args.query);
            let request = ChatRequest {
                model: Some(ctx.config.agent_model.clone()),
                messages: vec![Message::user(prompt)],
                max_tokens: ctx.config.max_tokens,
                temperature: Some(ctx.config.temperature),
                response_format: Some(ResponseFormat::json_schema(
                    RESPONSE_FORMAT_NAME,
                    response_schema(),
                )),
                ..Default::default()
            };

            let proposed = match complete_with_retry(ctx.provider, &request, &ctx.config.retry).await {
                Ok(completion) => {
                    let content = completion.content.unwrap_or_default();
                    parse_ranges(&content).unwrap_or_else(|| {
                        warn!("File search reply was not a chunk list: {content:.200}");
                        Vec::new()
                    })
                }
                Err(e) => {
                    warn!("File search request failed: {e}");
                    Vec::new()
                }
            };
            let ranges = chunks::merge_ranges(
                chunks::clamp(&proposed, file.num_lines()),
                ctx.config.range_merge_distance,
            );
            debug!(
                "File search for {:?} in {path}: {} ranges proposed, {} kept",
                args.query,
                proposed.len(),
                ranges.len()
            );
            ToolResult::FileSearch {
                frame_index,
                path,
                ranges,
            }
        })
    }

    fn render(&self, result: &ToolResult, ctx: &mut ToolContext<'_>) -> String {
        let ToolResult::FileSearch {
            frame_index,
            path,
            ranges,
        } = result
        else {
            return result.to_string();
        };
        if ranges.is_empty() {
            return result.to_string();
        }
        let current = ctx
            .session
            .frame(*frame_index)
            .filter(|f| &f.path == path)
            .map(|f| f.line);
        ranges
            .iter()
            .filter_map(|range| {
                ctx.session
                    .format_lines(path, range.first..=range.last, current)
                    .ok()
            })
            .map(|code| format!("<file>\n{path}\n</file>\n<code>\n{code}\n</code>"))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
