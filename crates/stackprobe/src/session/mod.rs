//! The paused program: debugger seam, frame cursor, and per-turn caches.
//!
//! [`Debugger`] is everything the agent needs from the host debugger. A
//! [`Session`] wraps one debugger together with the frame cursor. All cursor
//! movement goes through [`Session::select`]; [`Session::begin_turn`] and
//! [`Session::restore`] bracket an agent turn so frames the model visited
//! never leak into the user's view.

pub mod eval;
pub mod navigator;
pub mod snapshot;

use crate::context::chunks::SourceFile;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::ops::RangeInclusive;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub use eval::EvalError;
pub use navigator::{Direction, NavigationError};

// ── Frames ─────────────────────────────────────────────────────────

/// One activation record. `index` is stable for the session's lifetime;
/// index 0 is the oldest frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub index: usize,
    pub path: String,
    /// 1-indexed line currently executing in this frame.
    pub line: usize,
    pub function: String,
}

/// Source of a function, class or module resolved by the debugger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub path: String,
    /// Line number of `lines[0]`.
    pub first_line: usize,
    pub lines: Vec<String>,
}

impl Definition {
    pub fn last_line(&self) -> usize {
        self.first_line + self.lines.len().saturating_sub(1)
    }
}

/// Names bound in a frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Names {
    pub locals: Vec<String>,
    pub globals: Vec<String>,
}

/// Source text or an object's definition could not be produced.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("There is no object named `{0}` in the current frame.")]
    UnknownObject(String),
    #[error("Could not retrieve source code for `{object}`: {reason}")]
    NoSource { object: String, reason: String },
    #[error("Could not read `{path}`: {reason}")]
    Unreadable { path: String, reason: String },
}

// ── Debugger seam ──────────────────────────────────────────────────

/// Capabilities consumed from the host debugger.
///
/// Frame arguments are stack indices as returned by [`frames`](Self::frames).
/// Values are returned already rendered as text.
pub trait Debugger: Send + Sync {
    /// The call stack, oldest frame first.
    fn frames(&self) -> &[Frame];

    /// Frame the program is stopped in.
    fn initial_frame(&self) -> usize {
        self.frames().len().saturating_sub(1)
    }

    fn read_source(&self, path: &str) -> Result<String, ResourceError>;

    /// Evaluate an expression against the frame's bindings.
    fn evaluate(&self, frame: usize, expression: &str) -> Result<String, EvalError>;

    /// Argument bindings of the frame's function, in declaration order.
    fn arguments(&self, frame: usize) -> Vec<(String, String)>;

    /// Value returned by the frame's function, if it has returned.
    fn return_value(&self, frame: usize) -> Option<String>;

    fn names(&self, frame: usize) -> Names;

    /// Source of an object reachable from the frame.
    fn definition(&self, frame: usize, object: &str) -> Result<Definition, ResourceError>;

    /// Lines with breakpoints set in `path`.
    fn breakpoints(&self, path: &str) -> BTreeSet<usize>;

    /// Whether the frame belongs to library or runtime code.
    fn is_external(&self, frame: usize) -> bool {
        let _ = frame;
        false
    }

    /// Called whenever the session cursor moves, so the debugger can refresh
    /// bindings that depend on the selected frame.
    fn frame_selected(&mut self, frame: usize) {
        let _ = frame;
    }
}

// ── Session ────────────────────────────────────────────────────────

/// A debugger plus the frame cursor the agent moves around.
pub struct Session {
    debugger: Box<dyn Debugger>,
    cursor: usize,
    origin: usize,
    hide_external: bool,
    files: HashMap<String, Arc<SourceFile>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("frames", &self.debugger.frames().len())
            .field("cursor", &self.cursor)
            .field("origin", &self.origin)
            .field("hide_external", &self.hide_external)
            .finish()
    }
}

impl Session {
    pub fn new(debugger: Box<dyn Debugger>, hide_external: bool) -> Self {
        let depth = debugger.frames().len();
        let cursor = debugger.initial_frame().min(depth.saturating_sub(1));
        Self {
            debugger,
            cursor,
            origin: cursor,
            hide_external,
            files: HashMap::new(),
        }
    }

    pub fn debugger(&self) -> &dyn Debugger {
        self.debugger.as_ref()
    }

    pub fn frames(&self) -> &[Frame] {
        self.debugger.frames()
    }

    pub fn depth(&self) -> usize {
        self.debugger.frames().len()
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.debugger.frames().get(index)
    }

    pub fn current_index(&self) -> usize {
        self.cursor
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        self.frame(self.cursor)
    }

    /// Frame that was current when the turn began.
    pub fn origin(&self) -> usize {
        self.origin
    }

    pub fn hides_external(&self) -> bool {
        self.hide_external
    }

    /// Whether navigation may stop at `index`.
    pub fn is_eligible(&self, index: usize) -> bool {
        index < self.depth() && !(self.hide_external && self.debugger.is_external(index))
    }

    /// Move the cursor. The only place the cursor changes.
    pub fn select(&mut self, index: usize) -> Result<usize, NavigationError> {
        let depth = self.depth();
        if index >= depth {
            return Err(NavigationError::OutOfRange { index, depth });
        }
        if index != self.cursor {
            debug!("Selecting frame {index} (was {})", self.cursor);
        }
        self.cursor = index;
        self.debugger.frame_selected(index);
        Ok(index)
    }

    /// Start an agent turn: remember where the cursor is and drop per-turn
    /// caches.
    pub fn begin_turn(&mut self) {
        self.origin = self.cursor;
        self.files.clear();
    }

    /// Put the cursor back where the turn started.
    pub fn restore(&mut self) {
        if self.cursor != self.origin {
            // origin was a valid index when recorded and the stack is immutable.
            let _ = self.select(self.origin);
        }
    }

    /// Line-indexed source of `path`, cached for the rest of the turn.
    pub fn source_file(&mut self, path: &str) -> Result<Arc<SourceFile>, ResourceError> {
        if let Some(file) = self.files.get(path) {
            return Ok(Arc::clone(file));
        }
        let text = self.debugger.read_source(path)?;
        let file = Arc::new(SourceFile::new(path, &text));
        self.files.insert(path.to_string(), Arc::clone(&file));
        Ok(file)
    }

    /// Source line a frame is stopped on, trimmed.
    pub fn frame_source_line(&mut self, index: usize) -> Option<String> {
        let frame = self.frame(index)?.clone();
        let file = self.source_file(&frame.path).ok()?;
        file.line(frame.line).map(|l| l.trim().to_string())
    }

    /// pdb-style stack entry: `path(line)function()` followed by the
    /// executing source line.
    pub fn format_stack_entry(&mut self, index: usize) -> String {
        let Some(frame) = self.frame(index).cloned() else {
            return String::new();
        };
        let mut entry = format!("{}({}){}()", frame.path, frame.line, frame.function);
        if let Some(source) = self.frame_source_line(index) {
            entry.push_str("\n-> ");
            entry.push_str(&source);
        }
        entry
    }

    /// pdb-style listing of `range` in `path`: right-aligned line numbers,
    /// `B` on lines with breakpoints and `->` on `current`.
    pub fn format_lines(
        &mut self,
        path: &str,
        range: RangeInclusive<usize>,
        current: Option<usize>,
    ) -> Result<String, ResourceError> {
        let file = self.source_file(path)?;
        let breaks = self.debugger.breakpoints(path);
        let lines: Vec<String> = range
            .filter_map(|n| file.line(n).map(|text| (n, text)))
            .map(|(n, text)| {
                let mark = if breaks.contains(&n) { "B" } else { " " };
                let arrow = if current == Some(n) { "->" } else { "  " };
                format!("{n:>3} {mark}{arrow}\t{}", text.trim_end())
            })
            .collect();
        Ok(lines.join("\n"))
    }

    /// Stack trace, oldest frame first, with `marked` prefixed by `> `.
    /// External frames are left out when they are hidden from navigation,
    /// unless they are the marked frame.
    pub fn format_stack_trace(&mut self, marked: usize) -> String {
        self.stack_trace_entries(marked).join("\n")
    }

    /// One entry per eligible frame, oldest first, with `marked` prefixed by
    /// `> ` and always present.
    pub fn stack_trace_entries(&mut self, marked: usize) -> Vec<String> {
        let indices: Vec<usize> = (0..self.depth())
            .filter(|&i| i == marked || self.is_eligible(i))
            .collect();
        indices
            .into_iter()
            .map(|i| {
                let prefix = if i == marked { "> " } else { "  " };
                format!("{prefix}{}", self.format_stack_entry(i))
            })
            .collect()
    }
}
