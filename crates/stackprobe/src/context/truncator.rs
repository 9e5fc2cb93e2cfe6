//! Token-bounded truncation of rendered context.
//!
//! Every function here guarantees that its output costs at most
//! `max_tokens + ELLIPSIS_OVERHEAD` tokens as measured by the configured
//! [`Tokenizer`].

use super::tokenizer::{HeuristicTokenizer, Tokenizer};
use std::ops::RangeInclusive;
use std::sync::Arc;

/// Tokens reserved for the ellipsis marker inserted by a truncation.
pub const ELLIPSIS_OVERHEAD: usize = 3;

const ELLIPSIS: &str = "...";

/// Granularity of a truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncateUnit {
    /// Keep or drop whole lines.
    Line,
    /// Cut at token boundaries.
    Char,
}

/// Truncates text against a token ceiling.
#[derive(Clone)]
pub struct Truncator {
    tokenizer: Arc<dyn Tokenizer>,
}

impl std::fmt::Debug for Truncator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Truncator").finish_non_exhaustive()
    }
}

impl Default for Truncator {
    fn default() -> Self {
        Self::new(Arc::new(HeuristicTokenizer::default()))
    }
}

impl Truncator {
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self { tokenizer }
    }

    pub fn tokenizer(&self) -> &dyn Tokenizer {
        self.tokenizer.as_ref()
    }

    pub fn count(&self, text: &str) -> usize {
        self.tokenizer.count(text)
    }

    /// Cost of a line including the newline that joins it to the next.
    fn line_cost(&self, line: &str) -> usize {
        self.tokenizer.count(line) + self.tokenizer.count("\n")
    }

    /// Keep the beginning of `text`.
    ///
    /// Line mode keeps whole lines from the top and appends an ellipsis line.
    /// Char mode keeps the first `max_tokens` tokens and appends ` ...`.
    pub fn truncate_end(&self, text: &str, max_tokens: usize, unit: TruncateUnit) -> String {
        if self.count(text) <= max_tokens {
            return text.to_string();
        }

        match unit {
            TruncateUnit::Line => {
                let mut kept = Vec::new();
                let mut used = 0;
                for line in text.lines() {
                    let cost = self.line_cost(line);
                    if used + cost > max_tokens {
                        break;
                    }
                    used += cost;
                    kept.push(line);
                }
                if kept.is_empty() {
                    ELLIPSIS.to_string()
                } else {
                    format!("{}\n{ELLIPSIS}", kept.join("\n"))
                }
            }
            TruncateUnit::Char => {
                let tokens = self.tokenizer.encode(text);
                let head = self.tokenizer.decode(&tokens[..max_tokens.min(tokens.len())]);
                format!("{head} {ELLIPSIS}")
            }
        }
    }

    /// Keep both ends of `text`, dropping the middle.
    ///
    /// Char mode reserves [`ELLIPSIS_OVERHEAD`] tokens and keeps half of the
    /// remainder from each end. Line mode keeps the first and last lines and
    /// then admits lines alternately from just inside each end; texts of two
    /// lines or fewer, or whose outer lines alone overflow, fall back to
    /// char mode.
    pub fn truncate_middle(&self, text: &str, max_tokens: usize, unit: TruncateUnit) -> String {
        if self.count(text) <= max_tokens {
            return text.to_string();
        }

        let lines: Vec<&str> = text.lines().collect();
        if unit == TruncateUnit::Char || lines.len() <= 2 {
            return self.middle_chars(text, max_tokens);
        }

        let budget = max_tokens.saturating_sub(ELLIPSIS_OVERHEAD);
        let last = lines.len() - 1;
        let mut used = self.line_cost(lines[0]) + self.line_cost(lines[last]);
        if used > budget {
            return self.middle_chars(text, max_tokens);
        }

        // `head` and `tail` are the next candidate indices from each side.
        let mut head = 1;
        let mut tail = last - 1;
        let mut head_open = true;
        let mut tail_open = true;
        while (head_open || tail_open) && head <= tail {
            if head_open {
                let cost = self.line_cost(lines[head]);
                if used + cost <= budget {
                    used += cost;
                    head += 1;
                } else {
                    head_open = false;
                }
            }
            if tail_open && head <= tail {
                let cost = self.line_cost(lines[tail]);
                if used + cost <= budget {
                    used += cost;
                    tail -= 1;
                } else {
                    tail_open = false;
                }
            }
        }

        let mut out: Vec<&str> = lines[..head].to_vec();
        if head <= tail {
            out.push(ELLIPSIS);
        }
        out.extend_from_slice(&lines[tail + 1..]);
        out.join("\n")
    }

    fn middle_chars(&self, text: &str, max_tokens: usize) -> String {
        let tokens = self.tokenizer.encode(text);
        let keep = max_tokens.saturating_sub(ELLIPSIS_OVERHEAD);
        let start = keep / 2;
        let end = keep - start;
        let head = self.tokenizer.decode(&tokens[..start.min(tokens.len())]);
        let tail = self
            .tokenizer
            .decode(&tokens[tokens.len().saturating_sub(end)..]);
        format!("{head} {ELLIPSIS} {tail}")
    }

    /// Choose a window of `lines` around `center_line` (1-indexed) that fits
    /// in `max_tokens`.
    ///
    /// Returns the whole file when it fits. Otherwise the window grows one
    /// line earlier, then one line later, repeating; each direction stops at
    /// the first line that would overflow. The center line is always part of
    /// the window.
    pub fn window_truncate(
        &self,
        lines: &[&str],
        center_line: usize,
        max_tokens: usize,
    ) -> RangeInclusive<usize> {
        if lines.is_empty() {
            return 1..=0;
        }
        if self.count(&lines.join("\n")) <= max_tokens {
            return 1..=lines.len();
        }

        let center = center_line.clamp(1, lines.len());
        let mut start = center;
        let mut end = center;
        let mut used = self.line_cost(lines[center - 1]);
        let mut up_open = true;
        let mut down_open = true;

        while up_open || down_open {
            if up_open {
                if start > 1 && used + self.line_cost(lines[start - 2]) <= max_tokens {
                    used += self.line_cost(lines[start - 2]);
                    start -= 1;
                } else {
                    up_open = false;
                }
            }
            if down_open {
                if end < lines.len() && used + self.line_cost(lines[end]) <= max_tokens {
                    used += self.line_cost(lines[end]);
                    end += 1;
                } else {
                    down_open = false;
                }
            }
        }

        start..=end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> String {
        (1..=n)
            .map(|i| format!("value_{i} = compute(value_{})", i.saturating_sub(1)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn fitting_text_is_unchanged() {
        let t = Truncator::default();
        assert_eq!(t.truncate_end("short", 100, TruncateUnit::Line), "short");
        assert_eq!(t.truncate_middle("short", 100, TruncateUnit::Char), "short");
    }

    #[test]
    fn truncate_end_line_keeps_prefix_lines() {
        let t = Truncator::default();
        let text = numbered(50);
        let out = t.truncate_end(&text, 40, TruncateUnit::Line);
        assert!(out.starts_with("value_1 = compute(value_0)"));
        assert!(out.ends_with("\n..."));
        let kept: Vec<&str> = out.lines().filter(|l| *l != "...").collect();
        assert!(kept.iter().all(|l| text.lines().any(|orig| orig == *l)));
    }

    #[test]
    fn truncate_end_char_keeps_token_prefix() {
        let t = Truncator::default();
        let out = t.truncate_end("abcdefghijklmnop", 2, TruncateUnit::Char);
        assert_eq!(out, "abcdefgh ...");
    }

    #[test]
    fn truncate_middle_char_keeps_both_ends() {
        let t = Truncator::default();
        let text = "[".to_string() + &"1, ".repeat(200) + "999]";
        let out = t.truncate_middle(&text, 13, TruncateUnit::Char);
        assert!(out.starts_with("[1, "));
        assert!(out.ends_with("999]"));
        assert!(out.contains(" ... "));
    }

    #[test]
    fn truncate_middle_line_keeps_first_and_last() {
        let t = Truncator::default();
        let text = numbered(40);
        let out = t.truncate_middle(&text, 60, TruncateUnit::Line);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.first(), text.lines().next().as_ref());
        assert_eq!(lines.last(), text.lines().last().as_ref());
        assert_eq!(lines.iter().filter(|l| **l == "...").count(), 1);
        assert!(lines.len() >= 4, "admits lines from both sides: {out}");
    }

    #[test]
    fn truncate_middle_short_text_falls_back_to_chars() {
        let t = Truncator::default();
        let text = format!("{}\n{}", "a".repeat(80), "b".repeat(80));
        let out = t.truncate_middle(&text, 10, TruncateUnit::Line);
        assert!(out.starts_with("aaaa"));
        assert!(out.ends_with("bbbb"));
        assert!(out.contains(" ... "));
    }

    #[test]
    fn truncation_respects_ceiling() {
        let t = Truncator::default();
        let text = numbered(120);
        for max in [0, 1, 3, 7, 20, 64, 200, 511] {
            for unit in [TruncateUnit::Line, TruncateUnit::Char] {
                let end = t.truncate_end(&text, max, unit);
                assert!(t.count(&end) <= max + ELLIPSIS_OVERHEAD, "end {unit:?} {max}");
                let mid = t.truncate_middle(&text, max, unit);
                assert!(t.count(&mid) <= max + ELLIPSIS_OVERHEAD, "middle {unit:?} {max}");
            }
        }
    }

    #[test]
    fn window_returns_whole_file_when_it_fits() {
        let t = Truncator::default();
        assert_eq!(t.window_truncate(&["a", "b", "c"], 2, 100), 1..=3);
    }

    #[test]
    fn window_contains_center_and_fits() {
        let t = Truncator::default();
        let text = numbered(200);
        let lines: Vec<&str> = text.lines().collect();
        for center in [1, 2, 57, 199, 200] {
            let center_cost = t.count(lines[center - 1]) + 1;
            for max in [center_cost, center_cost + 5, 100, 400] {
                let range = t.window_truncate(&lines, center, max);
                assert!(range.contains(&center), "center {center} max {max}");
                let window = lines[range.start() - 1..*range.end()].join("\n");
                assert!(t.count(&window) <= max);
            }
        }
    }

    #[test]
    fn window_grows_both_directions() {
        let t = Truncator::default();
        let lines = vec!["aaaa"; 20];
        // Each line costs 2 tokens: 5 lines fit in 10.
        let range = t.window_truncate(&lines, 10, 10);
        assert_eq!(range, 8..=12);
    }

    #[test]
    fn window_clamps_out_of_range_center() {
        let t = Truncator::default();
        let lines = vec!["aaaa"; 20];
        let range = t.window_truncate(&lines, 99, 6);
        assert_eq!(range, 18..=20);
    }
}
