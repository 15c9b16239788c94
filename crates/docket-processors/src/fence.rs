//! Code fence and inline code tracking.
//!
//! Text-level processors (emoji) must leave code untouched. These helpers
//! find fenced code blocks during a line scan and inline code spans within
//! a line.

use std::ops::Range;

/// Tracks code fence state during line-by-line processing.
///
/// Code fences can use backticks or tildes (three or more). The closing
/// fence must use the same character and be at least as long as the opening
/// fence.
#[derive(Debug, Default)]
pub(crate) struct FenceTracker {
    fence_char: Option<char>,
    fence_len: usize,
}

impl FenceTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn in_fence(&self) -> bool {
        self.fence_char.is_some()
    }

    /// Update fence state for `line`.
    ///
    /// Returns `true` if the line is a fence marker (opening or closing).
    pub(crate) fn update(&mut self, line: &str) -> bool {
        let trimmed = line.trim_start();

        if let Some(fence_char) = self.fence_char {
            if is_closing_fence(trimmed, fence_char, self.fence_len) {
                self.fence_char = None;
                self.fence_len = 0;
                return true;
            }
            false
        } else if let Some((ch, len)) = detect_fence(trimmed) {
            self.fence_char = Some(ch);
            self.fence_len = len;
            true
        } else {
            false
        }
    }
}

fn detect_fence(trimmed: &str) -> Option<(char, usize)> {
    let first = trimmed.chars().next()?;
    if first != '`' && first != '~' {
        return None;
    }

    let count = trimmed.chars().take_while(|&c| c == first).count();
    (count >= 3).then_some((first, count))
}

fn is_closing_fence(trimmed: &str, expected_char: char, min_len: usize) -> bool {
    if !trimmed.starts_with(expected_char) {
        return false;
    }

    let count = trimmed.chars().take_while(|&c| c == expected_char).count();
    count >= min_len && trimmed[count..].chars().all(char::is_whitespace)
}

/// Byte ranges of inline code spans in `line`, backticks included.
///
/// A span closes at the next backtick run of the same length; unmatched
/// runs are literal text.
pub(crate) fn inline_code_spans(line: &str) -> Vec<Range<usize>> {
    let bytes = line.as_bytes();
    let run_end = |mut i: usize| {
        while i < bytes.len() && bytes[i] == b'`' {
            i += 1;
        }
        i
    };

    let mut spans = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'`' {
            i += 1;
            continue;
        }

        let open_start = i;
        let open_end = run_end(i);
        let open_len = open_end - open_start;

        let mut j = open_end;
        let mut close = None;
        while j < bytes.len() {
            if bytes[j] == b'`' {
                let end = run_end(j);
                if end - j == open_len {
                    close = Some(end);
                    break;
                }
                j = end;
            } else {
                j += 1;
            }
        }

        match close {
            Some(end) => {
                spans.push(open_start..end);
                i = end;
            }
            None => i = open_end,
        }
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backtick_fence() {
        let mut tracker = FenceTracker::new();

        assert!(tracker.update("```rust"));
        assert!(tracker.in_fence());
        assert!(!tracker.update("fn main() {}"));
        assert!(tracker.update("```"));
        assert!(!tracker.in_fence());
    }

    #[test]
    fn test_tilde_fence_not_closed_by_backticks() {
        let mut tracker = FenceTracker::new();

        assert!(tracker.update("~~~"));
        assert!(!tracker.update("```"));
        assert!(tracker.in_fence());
        assert!(tracker.update("~~~~"));
        assert!(!tracker.in_fence());
    }

    #[test]
    fn test_shorter_fence_not_closing() {
        let mut tracker = FenceTracker::new();

        assert!(tracker.update("````"));
        assert!(!tracker.update("```"));
        assert!(tracker.in_fence());
    }

    #[test]
    fn test_closing_fence_with_text_not_closing() {
        let mut tracker = FenceTracker::new();

        tracker.update("```");
        assert!(!tracker.update("``` not a close"));
        assert!(tracker.in_fence());
    }

    #[test]
    fn test_inline_code_spans() {
        let line = "a `x` b ``y ` z`` c";
        let spans = inline_code_spans(line);

        assert_eq!(spans, vec![2..5, 8..17]);
        assert_eq!(&line[spans[1].clone()], "``y ` z``");
    }

    #[test]
    fn test_unmatched_backtick_is_literal() {
        assert!(inline_code_spans("it`s fine").is_empty());
        assert_eq!(inline_code_spans("`` a ` b"), Vec::<Range<usize>>::new());
    }
}
