//! Single-pass document rewriting.
//!
//! Edits are collected against byte ranges of the *original* document and
//! applied at once, so no edit ever sees offsets shifted by another.

use std::ops::Range;

/// Collects range replacements for single-pass application.
#[derive(Debug)]
pub(crate) struct Splice<'a> {
    original: &'a str,
    edits: Vec<(Range<usize>, String)>,
}

impl<'a> Splice<'a> {
    pub(crate) fn new(original: &'a str) -> Self {
        Self {
            original,
            edits: Vec::new(),
        }
    }

    /// Replace `range` of the original document with `replacement`.
    pub(crate) fn replace(&mut self, range: Range<usize>, replacement: impl Into<String>) {
        debug_assert!(range.start <= range.end && range.end <= self.original.len());
        self.edits.push((range, replacement.into()));
    }

    /// Build the rewritten document.
    ///
    /// Edits may be added in any order. An edit overlapping an earlier one
    /// (by start offset) is dropped.
    pub(crate) fn apply(mut self) -> String {
        if self.edits.is_empty() {
            return self.original.to_owned();
        }

        self.edits.sort_by_key(|(range, _)| range.start);

        let added: usize = self.edits.iter().map(|(_, text)| text.len()).sum();
        let mut result = String::with_capacity(self.original.len() + added);
        let mut cursor = 0;

        for (range, text) in &self.edits {
            if range.start < cursor {
                tracing::warn!(
                    start = range.start,
                    end = range.end,
                    "dropping overlapping edit"
                );
                continue;
            }
            result.push_str(&self.original[cursor..range.start]);
            result.push_str(text);
            cursor = range.end;
        }

        result.push_str(&self.original[cursor..]);
        result
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_single_edit() {
        let mut splice = Splice::new("before [x] after");
        splice.replace(7..10, "REPLACED");
        assert_eq!(splice.apply(), "before REPLACED after");
    }

    #[test]
    fn test_growing_edit_does_not_shift_later_edit() {
        let doc = "[a] mid [b] end";
        let mut splice = Splice::new(doc);
        splice.replace(0..3, "a much longer replacement");
        splice.replace(8..11, "B");

        assert_eq!(splice.apply(), "a much longer replacement mid B end");
    }

    #[test]
    fn test_edits_out_of_order() {
        let doc = "[1][2][3]";
        let mut splice = Splice::new(doc);
        splice.replace(6..9, "three");
        splice.replace(0..3, "one");
        splice.replace(3..6, "two");

        assert_eq!(splice.apply(), "onetwothree");
    }

    #[test]
    fn test_insertion_and_deletion() {
        let mut splice = Splice::new("abcdef");
        splice.replace(0..0, ">");
        splice.replace(2..4, "");

        assert_eq!(splice.apply(), ">abef");
    }

    #[test]
    fn test_overlapping_edit_dropped() {
        let mut splice = Splice::new("abcdef");
        splice.replace(0..4, "X");
        splice.replace(2..5, "Y");

        assert_eq!(splice.apply(), "Xef");
    }

    #[test]
    fn test_no_edits() {
        let splice = Splice::new("unchanged");
        assert_eq!(splice.apply(), "unchanged");
    }
}
