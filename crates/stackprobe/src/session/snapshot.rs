//! A [`Debugger`] that replays a JSON snapshot of a stopped program.
//!
//! ```json
//! {
//!   "current": 1,
//!   "frames": [
//!     {"path": "app/main.py", "line": 12, "function": "main",
//!      "locals": {"cart": {"items": []}}, "globals": {"TAX": 0.2}},
//!     {"path": "app/cart.py", "line": 30, "function": "total",
//!      "arguments": {"cart": {"items": []}}, "return_value": 0}
//!   ],
//!   "sources": {"app/cart.py": "def total(cart):\n    ..."},
//!   "definitions": {"total": {"path": "app/cart.py", "line": 28, "end_line": 31}},
//!   "breakpoints": {"app/cart.py": [30]}
//! }
//! ```
//!
//! Frames are listed oldest first and `current` defaults to the newest.
//! Sources not inlined under `sources` are read from disk. A frame is
//! external when it says so or when its path looks like library code.

use super::eval::{self, EvalError};
use super::{Debugger, Definition, Frame, Names, ResourceError};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Path fragments that mark library or runtime code.
pub const EXTERNAL_PATH_MARKERS: &[&str] = &[
    "site-packages",
    "dist-packages",
    "node_modules",
    ".cargo/registry",
];

/// Whether `path` points into library code or a pseudo file such as
/// `<string>` or `<frozen importlib._bootstrap>`.
pub fn is_external_path(path: &str) -> bool {
    (path.starts_with('<') && path.ends_with('>'))
        || EXTERNAL_PATH_MARKERS.iter().any(|m| path.contains(m))
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid snapshot: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("current frame {current} is outside the stack (depth {depth})")]
    InvalidCurrent { current: usize, depth: usize },
}

// ── Wire format ────────────────────────────────────────────────────

/// Distinguishes an explicit `null` from a missing field.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Deserialize)]
struct FrameSnapshot {
    path: String,
    line: usize,
    function: String,
    #[serde(default)]
    arguments: Map<String, Value>,
    #[serde(default)]
    locals: Map<String, Value>,
    #[serde(default)]
    globals: Map<String, Value>,
    #[serde(default, deserialize_with = "present")]
    return_value: Option<Value>,
    #[serde(default)]
    external: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
struct DefinitionSnapshot {
    path: String,
    line: usize,
    end_line: usize,
}

#[derive(Debug, Clone, Deserialize)]
struct Snapshot {
    #[serde(default)]
    current: Option<usize>,
    frames: Vec<FrameSnapshot>,
    #[serde(default)]
    sources: HashMap<String, String>,
    #[serde(default)]
    definitions: HashMap<String, DefinitionSnapshot>,
    #[serde(default)]
    breakpoints: HashMap<String, BTreeSet<usize>>,
}

// ── Debugger ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SnapshotDebugger {
    frames: Vec<Frame>,
    states: Vec<FrameSnapshot>,
    current: usize,
    sources: HashMap<String, String>,
    definitions: HashMap<String, DefinitionSnapshot>,
    breakpoints: HashMap<String, BTreeSet<usize>>,
    /// Source paths are resolved relative to this directory when set.
    root: Option<PathBuf>,
}

impl SnapshotDebugger {
    pub fn from_json(text: &str) -> Result<Self, SnapshotError> {
        let snapshot: Snapshot = serde_json::from_str(text)?;
        Self::from_snapshot(snapshot)
    }

    pub fn from_value(value: Value) -> Result<Self, SnapshotError> {
        let snapshot: Snapshot = serde_json::from_value(value)?;
        Self::from_snapshot(snapshot)
    }

    /// Load a snapshot file. Relative source paths resolve against the
    /// snapshot's directory.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut debugger = Self::from_json(&text)?;
        debugger.root = path.parent().map(Path::to_path_buf);
        debug!(
            "Loaded snapshot {} ({} frames)",
            path.display(),
            debugger.frames.len()
        );
        Ok(debugger)
    }

    fn from_snapshot(snapshot: Snapshot) -> Result<Self, SnapshotError> {
        let depth = snapshot.frames.len();
        let current = snapshot.current.unwrap_or(depth.saturating_sub(1));
        if depth > 0 && current >= depth {
            return Err(SnapshotError::InvalidCurrent { current, depth });
        }
        let frames = snapshot
            .frames
            .iter()
            .enumerate()
            .map(|(index, f)| Frame {
                index,
                path: f.path.clone(),
                line: f.line,
                function: f.function.clone(),
            })
            .collect();
        Ok(Self {
            frames,
            states: snapshot.frames,
            current,
            sources: snapshot.sources,
            definitions: snapshot.definitions,
            breakpoints: snapshot.breakpoints,
            root: None,
        })
    }

    fn lookup<'s>(&'s self, frame: usize, name: &str) -> Option<&'s Value> {
        let state = self.states.get(frame)?;
        state
            .locals
            .get(name)
            .or_else(|| state.arguments.get(name))
            .or_else(|| state.globals.get(name))
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let candidate = PathBuf::from(path);
        match &self.root {
            Some(root) if candidate.is_relative() => root.join(candidate),
            _ => candidate,
        }
    }
}

impl Debugger for SnapshotDebugger {
    fn frames(&self) -> &[Frame] {
        &self.frames
    }

    fn initial_frame(&self) -> usize {
        self.current
    }

    fn read_source(&self, path: &str) -> Result<String, ResourceError> {
        if let Some(text) = self.sources.get(path) {
            return Ok(text.clone());
        }
        std::fs::read_to_string(self.resolve(path)).map_err(|e| ResourceError::Unreadable {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    fn evaluate(&self, frame: usize, expression: &str) -> Result<String, EvalError> {
        let scope = |name: &str| self.lookup(frame, name);
        eval::evaluate(expression, &scope).map(|v| eval::render(&v))
    }

    fn arguments(&self, frame: usize) -> Vec<(String, String)> {
        self.states
            .get(frame)
            .map(|s| {
                s.arguments
                    .iter()
                    .map(|(k, v)| (k.clone(), eval::render(v)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn return_value(&self, frame: usize) -> Option<String> {
        self.states
            .get(frame)?
            .return_value
            .as_ref()
            .map(eval::render)
    }

    fn names(&self, frame: usize) -> Names {
        let Some(state) = self.states.get(frame) else {
            return Names::default();
        };
        let mut locals: Vec<String> = state.arguments.keys().cloned().collect();
        locals.extend(
            state
                .locals
                .keys()
                .filter(|k| !state.arguments.contains_key(*k))
                .cloned(),
        );
        Names {
            locals,
            globals: state.globals.keys().cloned().collect(),
        }
    }

    fn definition(&self, frame: usize, object: &str) -> Result<Definition, ResourceError> {
        if let Some(def) = self.definitions.get(object) {
            let text = self.read_source(&def.path).map_err(|e| ResourceError::NoSource {
                object: object.to_string(),
                reason: e.to_string(),
            })?;
            let first = def.line.max(1);
            let lines: Vec<String> = text
                .lines()
                .skip(first - 1)
                .take(def.end_line.saturating_sub(first) + 1)
                .map(str::to_string)
                .collect();
            if lines.is_empty() {
                return Err(ResourceError::NoSource {
                    object: object.to_string(),
                    reason: format!("lines {first}-{} are not in {}", def.end_line, def.path),
                });
            }
            return Ok(Definition {
                path: def.path.clone(),
                first_line: first,
                lines,
            });
        }
        let scope = |name: &str| self.lookup(frame, name);
        match eval::evaluate(object, &scope) {
            Ok(value) => Err(ResourceError::NoSource {
                object: object.to_string(),
                reason: format!(
                    "it is a `{}` value, not a function, class or module",
                    eval::type_name(&value)
                ),
            }),
            Err(_) => Err(ResourceError::UnknownObject(object.to_string())),
        }
    }

    fn breakpoints(&self, path: &str) -> BTreeSet<usize> {
        self.breakpoints.get(path).cloned().unwrap_or_default()
    }

    fn is_external(&self, frame: usize) -> bool {
        self.states
            .get(frame)
            .map(|s| s.external.unwrap_or_else(|| is_external_path(&s.path)))
            .unwrap_or(false)
    }
}
