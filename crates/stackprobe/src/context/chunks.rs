//! Chunk algebra: deduplicating and bridging source selections.
//!
//! Tools that show code (object source, file search) each produce a handful
//! of line selections. Before they reach the answer prompt they are pushed
//! through [`curate`] = [`merge`] → [`normalize`] → [`collapse`], which
//! yields exactly one display block per file. All functions group by file
//! path through a `BTreeMap`, so the output never depends on the order of
//! the input chunks.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Default number of missing lines [`normalize`] will fill to join two
/// selections.
pub const DEFAULT_MAX_GAP_FILL: usize = 15;

/// Default distance within which [`merge_ranges`] fuses proposed ranges.
pub const DEFAULT_RANGE_MERGE_DISTANCE: usize = 10;

/// Marker rendered in place of skipped lines.
pub const GAP_MARKER: &str = "⋮...";

// ── Files ──────────────────────────────────────────────────────────

/// Line-indexed view of a source file. Shared read-only between all chunks
/// that reference it during a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    path: String,
    lines: Vec<String>,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, text: &str) -> Self {
        Self {
            path: path.into(),
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// 1-indexed line lookup.
    pub fn line(&self, number: usize) -> Option<&str> {
        number
            .checked_sub(1)
            .and_then(|i| self.lines.get(i))
            .map(String::as_str)
    }

    pub fn num_lines(&self) -> usize {
        self.lines.len()
    }
}

// ── Chunks ─────────────────────────────────────────────────────────

/// A selection of 1-indexed lines from one file.
///
/// Two chunks are equal when they refer to the same path and the same set of
/// lines.
#[derive(Debug, Clone)]
pub struct CodeChunk {
    file: Arc<SourceFile>,
    lines: BTreeSet<usize>,
}

impl PartialEq for CodeChunk {
    fn eq(&self, other: &Self) -> bool {
        self.file.path == other.file.path && self.lines == other.lines
    }
}

impl Eq for CodeChunk {}

impl Hash for CodeChunk {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.file.path.hash(state);
        self.lines.hash(state);
    }
}

impl CodeChunk {
    pub fn new(file: Arc<SourceFile>, lines: impl IntoIterator<Item = usize>) -> Self {
        Self {
            file,
            lines: lines.into_iter().collect(),
        }
    }

    /// Chunk covering `range.first..=range.last`.
    pub fn from_range(file: Arc<SourceFile>, range: LineRange) -> Self {
        Self::new(file, range.first..=range.last)
    }

    pub fn file(&self) -> &Arc<SourceFile> {
        &self.file
    }

    pub fn path(&self) -> &str {
        &self.file.path
    }

    pub fn lines(&self) -> &BTreeSet<usize> {
        &self.lines
    }

    /// Render the selected lines in file order, optionally prefixed with
    /// their line numbers. Each run of skipped lines becomes a single
    /// [`GAP_MARKER`].
    pub fn render(&self, line_numbers: bool) -> String {
        let mut out: Vec<String> = Vec::new();
        let mut in_gap = false;
        for (i, text) in self.file.lines.iter().enumerate() {
            let number = i + 1;
            if !self.lines.contains(&number) {
                if !in_gap {
                    out.push(GAP_MARKER.to_string());
                    in_gap = true;
                }
                continue;
            }
            in_gap = false;
            out.push(if line_numbers {
                format!("{number} {}", text.trim_end())
            } else {
                text.trim_end().to_string()
            });
        }
        out.join("\n").trim_matches('\n').to_string()
    }
}

impl fmt::Display for CodeChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(true))
    }
}

// ── Grouping ───────────────────────────────────────────────────────

struct FileLines {
    file: Arc<SourceFile>,
    lines: BTreeSet<usize>,
}

fn group_by_file<'a>(chunks: impl IntoIterator<Item = &'a CodeChunk>) -> BTreeMap<String, FileLines> {
    let mut groups: BTreeMap<String, FileLines> = BTreeMap::new();
    for chunk in chunks {
        groups
            .entry(chunk.file.path.clone())
            .or_insert_with(|| FileLines {
                file: Arc::clone(&chunk.file),
                lines: BTreeSet::new(),
            })
            .lines
            .extend(chunk.lines.iter().copied());
    }
    groups
}

/// Split a sorted line set into maximal runs of consecutive lines.
fn contiguous_runs(file: &Arc<SourceFile>, lines: &BTreeSet<usize>) -> Vec<CodeChunk> {
    let mut runs: Vec<CodeChunk> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    for &line in lines {
        if current.last().is_some_and(|&last| line != last + 1) {
            runs.push(CodeChunk::new(Arc::clone(file), current.drain(..)));
        }
        current.push(line);
    }
    if !current.is_empty() {
        runs.push(CodeChunk::new(Arc::clone(file), current));
    }
    runs
}

// ── Operations ─────────────────────────────────────────────────────

/// Union the lines of every chunk per file and split them into maximal
/// contiguous runs. Overlapping and adjacent selections become one run.
pub fn merge(chunks: &[CodeChunk]) -> Vec<CodeChunk> {
    group_by_file(chunks)
        .values()
        .flat_map(|group| contiguous_runs(&group.file, &group.lines))
        .collect()
}

/// Bridge near-but-not-adjacent selections.
///
/// Per file, every kept line pulls in up to `max_gap_fill` following lines,
/// stopping at the next kept line or the file's last line. A narrow gap is
/// closed, a wide one is narrowed, and the last selection gains trailing
/// context.
pub fn normalize(chunks: &[CodeChunk], max_gap_fill: usize) -> Vec<CodeChunk> {
    group_by_file(chunks)
        .values()
        .flat_map(|group| {
            let last_line = group.file.num_lines();
            let mut filled = group.lines.clone();
            let mut kept = group.lines.iter().copied().peekable();
            while let Some(line) = kept.next() {
                let stop = kept.peek().map_or(last_line + 1, |&next| next.min(last_line + 1));
                let end = line.saturating_add(max_gap_fill).min(stop.saturating_sub(1));
                filled.extend(line + 1..=end);
            }
            contiguous_runs(&group.file, &filled)
        })
        .collect()
}

/// Exactly one chunk per file holding the union of all its lines.
pub fn collapse(chunks: &[CodeChunk]) -> Vec<CodeChunk> {
    group_by_file(chunks)
        .into_values()
        .map(|group| CodeChunk {
            file: group.file,
            lines: group.lines,
        })
        .collect()
}

/// The curation pipeline: `collapse(normalize(merge(chunks)))`.
///
/// Deterministic and independent of input order. Feeding the output back in
/// widens it again, since every kept line keeps pulling in context.
pub fn curate(chunks: &[CodeChunk], max_gap_fill: usize) -> Vec<CodeChunk> {
    collapse(&normalize(&merge(chunks), max_gap_fill))
}

// ── Proposed ranges ────────────────────────────────────────────────

/// A line range as proposed by the model. May be out of bounds or inverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ProposedRange {
    pub first: i64,
    pub last: i64,
}

/// Inclusive, in-bounds line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LineRange {
    pub first: usize,
    pub last: usize,
}

impl LineRange {
    pub fn new(first: usize, last: usize) -> Self {
        Self { first, last }
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.last)
    }
}

/// Floor `first` at line 1, cap `last` at `last_line`, and drop ranges that
/// end up empty.
pub fn clamp(ranges: &[ProposedRange], last_line: usize) -> Vec<LineRange> {
    let cap = i64::try_from(last_line).unwrap_or(i64::MAX);
    ranges
        .iter()
        .filter_map(|r| {
            let first = r.first.max(1);
            let last = r.last.max(1).min(cap);
            if first > last {
                return None;
            }
            Some(LineRange::new(
                usize::try_from(first).ok()?,
                usize::try_from(last).ok()?,
            ))
        })
        .collect()
}

/// Sort ranges and fuse those that overlap or are separated by at most
/// `max_distance` lines.
pub fn merge_ranges(mut ranges: Vec<LineRange>, max_distance: usize) -> Vec<LineRange> {
    ranges.sort();
    let mut merged: Vec<LineRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(current) if range.first <= current.last + max_distance => {
                current.last = current.last.max(range.last);
            }
            _ => merged.push(range),
        }
    }
    merged
}
