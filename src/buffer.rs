//! Text buffer abstraction consumed by the replacement engine.
//!
//! The engine never owns text. A host editor exposes its buffer through
//! [`TextBuffer`]: full-text reads, line lookups, the word under a
//! position, the current selection/caret, and atomic batch edits.
//! [`StringBuffer`] is the in-memory implementation used by tests and by
//! hosts that have no buffer of their own.
//!
//! All offsets are byte offsets into the buffer text and must lie on
//! `char` boundaries. Spans are half-open (`start..end`).

use crate::error::{SnipError, SnipResult};

/// A half-open byte range within buffer text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Create a span from start/end byte offsets.
    ///
    /// Swapped bounds are normalized so `start <= end` always holds.
    pub fn new(start: usize, end: usize) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Create an empty span at `offset`.
    pub const fn at(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `other` lies entirely within this span.
    pub const fn contains(&self, other: Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Whether the two spans share at least one byte.
    pub const fn overlaps(&self, other: Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Slice `text` to this span.
    ///
    /// Returns `None` if the span is out of bounds or splits a `char`.
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.get(self.start..self.end)
    }
}

/// One span replacement within a batch edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub span: Span,
    pub text: String,
}

impl Edit {
    pub fn new(span: Span, text: impl Into<String>) -> Self {
        Self {
            span,
            text: text.into(),
        }
    }
}

/// Word-character classification used for whole-word matching and the
/// word-under-cursor lookup: alphanumeric or underscore.
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Read/edit surface a host editor exposes to the replacement engine.
///
/// Mutation calls must be serialized by the caller; one engine instance
/// guards one buffer and the trait adds no locking of its own.
pub trait TextBuffer {
    /// The full buffer text.
    fn text(&self) -> &str;

    /// Current selection span (empty when nothing is selected).
    fn selection(&self) -> Span;

    /// Current caret position as a byte offset.
    fn caret(&self) -> usize;

    /// Apply a batch of edits atomically against the current snapshot.
    ///
    /// All spans refer to the text as it was when the batch was built.
    /// The whole batch is validated first; if any edit is out of bounds,
    /// splits a `char`, or overlaps another, nothing is applied.
    fn apply_edits(&mut self, edits: &[Edit]) -> SnipResult<()>;

    /// Insert `text` at the given byte offset.
    fn insert(&mut self, offset: usize, text: &str) -> SnipResult<()>;

    fn len(&self) -> usize {
        self.text().len()
    }

    fn is_empty(&self) -> bool {
        self.text().is_empty()
    }

    /// Number of lines; an empty buffer has one (empty) line.
    fn line_count(&self) -> usize {
        self.text().split('\n').count()
    }

    /// Span of the given line, excluding its trailing newline.
    fn line_span(&self, line: usize) -> Option<Span> {
        let text = self.text();
        let mut start = 0;
        for (i, segment) in text.split('\n').enumerate() {
            if i == line {
                return Some(Span::new(start, start + segment.len()));
            }
            start += segment.len() + 1;
        }
        None
    }

    /// Span of the line containing `offset`, excluding the newline.
    ///
    /// Offsets past the end resolve to the last line.
    fn line_span_at(&self, offset: usize) -> Span {
        let text = self.text();
        let mut start = 0;
        let mut last = Span::at(0);
        for segment in text.split('\n') {
            let span = Span::new(start, start + segment.len());
            // The newline itself belongs to the line it terminates.
            if offset <= span.end {
                return span;
            }
            start += segment.len() + 1;
            last = span;
        }
        last
    }

    /// The character ending at `offset`, if any.
    fn char_before(&self, offset: usize) -> Option<char> {
        self.text().get(..offset)?.chars().next_back()
    }

    /// The character starting at `offset`, if any.
    fn char_after(&self, offset: usize) -> Option<char> {
        self.text().get(offset..)?.chars().next()
    }

    /// Span of the contiguous word-character run around `offset`.
    ///
    /// Empty span at `offset` when the position touches no word chars.
    fn word_span_at(&self, offset: usize) -> Span {
        let text = self.text();
        let offset = offset.min(text.len());

        let mut start = offset;
        while let Some(c) = text.get(..start).and_then(|s| s.chars().next_back()) {
            if !is_word_char(c) {
                break;
            }
            start -= c.len_utf8();
        }

        let mut end = offset;
        while let Some(c) = text.get(end..).and_then(|s| s.chars().next()) {
            if !is_word_char(c) {
                break;
            }
            end += c.len_utf8();
        }

        Span::new(start, end)
    }
}

/// In-memory [`TextBuffer`] over a `String`.
#[derive(Debug, Clone, Default)]
pub struct StringBuffer {
    text: String,
    selection: Span,
    caret: usize,
}

impl StringBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            selection: Span::at(0),
            caret: 0,
        }
    }

    /// Set the selection, clamped to the buffer length.
    pub fn set_selection(&mut self, span: Span) {
        let len = self.text.len();
        self.selection = Span::new(span.start.min(len), span.end.min(len));
    }

    /// Set the caret, clamped to the buffer length.
    pub fn set_caret(&mut self, offset: usize) {
        self.caret = offset.min(self.text.len());
    }

    /// Validate a batch against the current text: bounds, char
    /// boundaries, and pairwise overlap.
    fn validate_batch(&self, edits: &[Edit]) -> SnipResult<Vec<usize>> {
        let len = self.text.len();
        for edit in edits {
            if edit.span.end > len {
                return Err(SnipError::BufferEdit {
                    reason: format!(
                        "span {}..{} exceeds buffer length {len}",
                        edit.span.start, edit.span.end
                    ),
                });
            }
            if !self.text.is_char_boundary(edit.span.start)
                || !self.text.is_char_boundary(edit.span.end)
            {
                return Err(SnipError::BufferEdit {
                    reason: format!(
                        "span {}..{} splits a character",
                        edit.span.start, edit.span.end
                    ),
                });
            }
        }

        // Sort indices by span start and check neighbors for overlap.
        let mut order: Vec<usize> = (0..edits.len()).collect();
        order.sort_by_key(|&i| (edits[i].span.start, edits[i].span.end));
        for pair in order.windows(2) {
            let (a, b) = (edits[pair[0]].span, edits[pair[1]].span);
            if a.overlaps(b) {
                return Err(SnipError::BufferEdit {
                    reason: format!(
                        "spans {}..{} and {}..{} overlap",
                        a.start, a.end, b.start, b.end
                    ),
                });
            }
        }
        Ok(order)
    }
}

impl TextBuffer for StringBuffer {
    fn text(&self) -> &str {
        &self.text
    }

    fn selection(&self) -> Span {
        self.selection
    }

    fn caret(&self) -> usize {
        self.caret
    }

    fn apply_edits(&mut self, edits: &[Edit]) -> SnipResult<()> {
        let order = self.validate_batch(edits)?;

        // Apply back-to-front so earlier spans stay valid.
        for &i in order.iter().rev() {
            let edit = &edits[i];
            self.text
                .replace_range(edit.span.start..edit.span.end, &edit.text);
        }

        // Track caret/selection through the batch.
        let shift = |pos: usize| -> usize {
            let mut shifted = pos;
            for &i in &order {
                let edit = &edits[i];
                if edit.span.end <= pos {
                    shifted = (shifted + edit.text.len()).saturating_sub(edit.span.len());
                } else if edit.span.start < pos {
                    // Position was inside a replaced span; land after it.
                    shifted = (shifted + edit.text.len()).saturating_sub(pos - edit.span.start);
                }
            }
            shifted
        };
        self.caret = shift(self.caret).min(self.text.len());
        self.selection = Span::new(
            shift(self.selection.start).min(self.text.len()),
            shift(self.selection.end).min(self.text.len()),
        );
        Ok(())
    }

    fn insert(&mut self, offset: usize, text: &str) -> SnipResult<()> {
        if offset > self.text.len() || !self.text.is_char_boundary(offset) {
            return Err(SnipError::BufferEdit {
                reason: format!("insert offset {offset} is not a valid position"),
            });
        }
        self.text.insert_str(offset, text);
        if self.caret >= offset {
            self.caret += text.len();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_normalizes_swapped_bounds() {
        let span = Span::new(5, 2);
        assert_eq!(span, Span::new(2, 5));
        assert_eq!(span.len(), 3);
    }

    #[test]
    fn test_line_span_excludes_newline() {
        let buf = StringBuffer::new("one\ntwo\nthree");
        assert_eq!(buf.line_span(0), Some(Span::new(0, 3)));
        assert_eq!(buf.line_span(1), Some(Span::new(4, 7)));
        assert_eq!(buf.line_span(2), Some(Span::new(8, 13)));
        assert_eq!(buf.line_span(3), None);
        assert_eq!(buf.line_count(), 3);
    }

    #[test]
    fn test_line_span_at_offset() {
        let buf = StringBuffer::new("one\ntwo");
        assert_eq!(buf.line_span_at(0), Span::new(0, 3));
        assert_eq!(buf.line_span_at(3), Span::new(0, 3));
        assert_eq!(buf.line_span_at(4), Span::new(4, 7));
        assert_eq!(buf.line_span_at(100), Span::new(4, 7));
    }

    #[test]
    fn test_word_span_at_middle_and_edges() {
        let buf = StringBuffer::new("foo bar_baz!");
        assert_eq!(buf.word_span_at(1), Span::new(0, 3));
        assert_eq!(buf.word_span_at(5), Span::new(4, 11));
        // On the '!' there is a word run ending right before it.
        assert_eq!(buf.word_span_at(11), Span::new(4, 11));
        // Past the '!' no word run touches the position.
        assert!(buf.word_span_at(12).is_empty());
    }

    #[test]
    fn test_word_span_at_no_word() {
        let buf = StringBuffer::new("( )");
        assert!(buf.word_span_at(1).is_empty());
    }

    #[test]
    fn test_apply_edits_batch() {
        let mut buf = StringBuffer::new("x + x");
        let edits = vec![
            Edit::new(Span::new(0, 1), "$x$"),
            Edit::new(Span::new(4, 5), "$x$"),
        ];
        buf.apply_edits(&edits).expect("batch should apply");
        assert_eq!(buf.text(), "$x$ + $x$");
    }

    #[test]
    fn test_apply_edits_rejects_overlap() {
        let mut buf = StringBuffer::new("abcdef");
        let edits = vec![
            Edit::new(Span::new(0, 3), "x"),
            Edit::new(Span::new(2, 5), "y"),
        ];
        assert!(buf.apply_edits(&edits).is_err());
        assert_eq!(buf.text(), "abcdef");
    }

    #[test]
    fn test_apply_edits_rejects_out_of_bounds() {
        let mut buf = StringBuffer::new("ab");
        let edits = vec![Edit::new(Span::new(1, 9), "x")];
        assert!(buf.apply_edits(&edits).is_err());
        assert_eq!(buf.text(), "ab");
    }

    #[test]
    fn test_insert_moves_caret() {
        let mut buf = StringBuffer::new("hello");
        buf.set_caret(5);
        buf.insert(5, "!").expect("insert");
        assert_eq!(buf.text(), "hello!");
        assert_eq!(buf.caret(), 6);
    }

    #[test]
    fn test_multibyte_char_before_after() {
        let buf = StringBuffer::new("aé$b");
        assert_eq!(buf.char_before(3), Some('é'));
        assert_eq!(buf.char_after(3), Some('$'));
    }
}
