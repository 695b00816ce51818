//! Replacement engine.
//!
//! One engine instance guards one text buffer. It owns the delimiter,
//! the ordered table of replacement metadata rows, and the operations
//! that keep markers in code text consistent with that table: creating a
//! marker from an identifier, renaming it everywhere, deleting it back
//! to bare text, and reconciling markers the user typed directly.
//!
//! All mutation goes through [`TextBuffer::apply_edits`] as one batch per
//! operation; the engine never holds a reference to the buffer and must
//! be called serialized, from one thread at a time.

use fancy_regex::Regex as FancyRegex;
use tracing::{debug, warn};

use crate::buffer::{Edit, Span, TextBuffer, is_word_char};
use crate::marker::{is_reserved_identifier, pattern};
use crate::model::{DEFAULT_DELIMITER, Literal, Snippet};

/// Marker/metadata state for a single snippet code buffer.
#[derive(Debug)]
pub struct ReplacementEngine {
    delimiter: char,
    records: Vec<Literal>,
    /// Single character of the most recent buffer change, when that
    /// change inserted exactly one character. Heuristic input for the
    /// line-scoped reconcile.
    last_char_entered: Option<char>,
    occurrence: FancyRegex,
}

impl Default for ReplacementEngine {
    fn default() -> Self {
        Self::new(DEFAULT_DELIMITER)
    }
}

impl ReplacementEngine {
    pub fn new(delimiter: char) -> Self {
        Self {
            delimiter,
            records: Vec::new(),
            last_char_entered: None,
            occurrence: pattern::occurrence_regex(delimiter),
        }
    }

    /// Engine seeded with a snippet's delimiter and replacement rows.
    pub fn from_snippet(snippet: &Snippet) -> Self {
        let mut engine = Self::new(snippet.delimiter());
        engine.records = snippet.literals.clone();
        engine
    }

    pub const fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Change the delimiter character. Existing text is not rewritten;
    /// hosts typically follow this with a full reconcile.
    pub fn set_delimiter(&mut self, delimiter: char) {
        if self.delimiter != delimiter {
            self.delimiter = delimiter;
            self.occurrence = pattern::occurrence_regex(delimiter);
        }
    }

    /// The metadata rows, in creation order.
    pub fn records(&self) -> &[Literal] {
        &self.records
    }

    /// Look up a row by identifier (case-sensitive).
    pub fn record(&self, id: &str) -> Option<&Literal> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Mutable row lookup, for hosts editing tooltip/default/type cells.
    pub fn record_mut(&mut self, id: &str) -> Option<&mut Literal> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    /// Replace the whole row table (e.g. after loading a snippet).
    pub fn load_records(&mut self, records: Vec<Literal>) {
        self.records = records;
    }

    /// The last single typed character, if the most recent change was a
    /// one-character insertion.
    pub const fn last_char_entered(&self) -> Option<char> {
        self.last_char_entered
    }

    fn delimited(&self, id: &str) -> String {
        let mut out = String::with_capacity(id.len() + 2);
        out.push(self.delimiter);
        out.push_str(id);
        out.push(self.delimiter);
        out
    }

    /// Strip one delimiter from each end of a full marker occurrence.
    fn interior<'a>(&self, text: &'a str) -> &'a str {
        if text.chars().count() > 2 {
            if let Some(inner) = text
                .strip_prefix(self.delimiter)
                .and_then(|t| t.strip_suffix(self.delimiter))
            {
                return inner;
            }
        }
        text
    }

    /// Whether `text` may become a replacement identifier: a bare word
    /// or a double-quoted string, non-empty after trimming, and free of
    /// the delimiter character.
    pub fn validate_candidate(&self, text: &str) -> bool {
        if text.trim().is_empty() || text.contains(self.delimiter) {
            return false;
        }
        pattern::candidate_regex().is_match(text)
    }

    /// Whether `text` is already in delimited marker form.
    fn is_text_replacement(&self, text: &str) -> bool {
        text.chars().next() == Some(self.delimiter)
            && text.chars().next_back() == Some(self.delimiter)
    }

    fn span_is_replacement(&self, text: &str, span: Span) -> bool {
        let Some(span_text) = span.slice(text) else {
            return false;
        };
        if span_text.is_empty() {
            return false;
        }
        if self.is_text_replacement(span_text) {
            return true;
        }
        // Interior form: delimiters immediately surround the span.
        let before = text[..span.start].chars().next_back();
        let after = text[span.end..].chars().next();
        before == Some(self.delimiter) && after == Some(self.delimiter)
    }

    /// Whether the span is a marker occurrence: its own text is
    /// delimiter-wrapped, or it is the interior of a delimited region.
    pub fn is_span_replacement(&self, buffer: &dyn TextBuffer, span: Span) -> bool {
        self.span_is_replacement(buffer.text(), span)
    }

    /// Create a replacement for `identifier` and delimit every bare
    /// whole-word occurrence in the buffer.
    ///
    /// Returns true iff at least one occurrence was delimited. Reserved
    /// identifiers (`end`, `selected`) and invalid candidates are
    /// declined without touching text or metadata.
    pub fn create_replacement(&mut self, buffer: &mut dyn TextBuffer, identifier: &str) -> bool {
        if is_reserved_identifier(identifier) {
            debug!(identifier, "declined reserved identifier");
            return false;
        }
        let identifier = identifier.trim();
        if identifier.is_empty() || !self.validate_candidate(identifier) {
            return false;
        }

        if self.record(identifier).is_none() {
            self.records.push(Literal::for_identifier(identifier));
        }

        let delimited = self.delimited(identifier);
        let replaced = self.replace_all(buffer, identifier, &delimited, true);
        debug!(identifier, replaced, "create replacement");
        replaced > 0
    }

    /// Rename a replacement everywhere.
    ///
    /// Pass 1 rewrites delimited old-id occurrences to the delimited new
    /// id (existing markers are overridden, not skipped). Pass 2 then
    /// delimits any bare occurrence of the new id left in the text. The
    /// second pass runs over the post-pass-1 text: a valid identifier
    /// cannot contain the delimiter, so bare matches can never overlap
    /// pass-1 output, and marker interiors are excluded by the skip rule.
    ///
    /// Returns false (text and table untouched) when `new_id` fails the
    /// candidate grammar; the host restores its previous display value.
    pub fn rename_replacement(
        &mut self,
        buffer: &mut dyn TextBuffer,
        old_id: &str,
        new_id: &str,
    ) -> bool {
        if old_id == new_id {
            return false;
        }
        if !self.validate_candidate(new_id) || is_reserved_identifier(new_id) {
            debug!(old_id, new_id, "declined invalid rename target");
            return false;
        }

        let old_delimited = self.delimited(old_id);
        let new_delimited = self.delimited(new_id);
        self.replace_all(buffer, &old_delimited, &new_delimited, false);
        self.replace_all(buffer, new_id, &new_delimited, true);

        if let Some(record) = self.records.iter_mut().find(|r| r.id == old_id) {
            record.id = new_id.to_owned();
        }
        debug!(old_id, new_id, "renamed replacement");
        true
    }

    /// Delete the replacement row for `id` and un-delimit every marker
    /// occurrence back to the bare identifier.
    ///
    /// Returns true iff a row was removed.
    pub fn delete_replacement(&mut self, buffer: &mut dyn TextBuffer, id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        let removed = self.records.len() != before;

        let delimited = self.delimited(id);
        self.replace_all(buffer, &delimited, id, false);
        debug!(id, removed, "deleted replacement");
        removed
    }

    /// Find markers typed directly into the code (e.g. `$foo$`) that
    /// have no metadata row yet, and create rows for them.
    ///
    /// Runs over the whole buffer; idempotent on unchanged text.
    pub fn scan_and_reconcile(&mut self, buffer: &mut dyn TextBuffer) {
        let snapshot = buffer.text().to_owned();
        self.reconcile_text(buffer, &snapshot);
    }

    /// Buffer-change notification from the host.
    ///
    /// `start_col`/`new_end_col` are byte columns of the change on
    /// `line`. When the change inserted exactly one character, that
    /// character is remembered; if it is the delimiter, the changed line
    /// is reconciled immediately (typing the closing `$` of `$foo$`
    /// creates the row without a full-text scan).
    pub fn on_text_changed(
        &mut self,
        buffer: &mut dyn TextBuffer,
        line: usize,
        start_col: usize,
        new_end_col: usize,
    ) {
        self.last_char_entered = if new_end_col.wrapping_sub(start_col) == 1 {
            buffer
                .line_span(line)
                .and_then(|span| buffer.char_after(span.start + start_col))
        } else {
            None
        };

        if self.last_char_entered == Some(self.delimiter) {
            if let Some(span) = buffer.line_span(line) {
                if let Some(line_text) = span.slice(buffer.text()) {
                    let line_text = line_text.to_owned();
                    self.reconcile_text(buffer, &line_text);
                }
            }
        }
    }

    fn reconcile_text(&mut self, buffer: &mut dyn TextBuffer, text: &str) {
        let mut missing: Vec<String> = Vec::new();
        for found in self.occurrence.find_iter(text) {
            let Ok(m) = found else {
                continue;
            };
            let interior = self.interior(m.as_str());
            if self.record(interior).is_none() && !missing.iter().any(|seen| seen == interior) {
                missing.push(interior.to_owned());
            }
        }
        for identifier in missing {
            self.create_replacement(buffer, &identifier);
        }
    }

    /// Resolve the marker at a caret position: the word under the
    /// cursor, the selection when no word is there, or the enclosing
    /// double-quoted span when the cursor sits inside a quoted marker
    /// like `$"some text"$`.
    pub fn find_clicked_replacement(
        &self,
        buffer: &dyn TextBuffer,
        position: usize,
    ) -> Option<Span> {
        let word_span = buffer.word_span_at(position);
        let mut result = word_span;
        if word_span.is_empty() {
            // More than a word may be selected; use the selection.
            result = buffer.selection();
        }

        if !self.is_span_replacement(buffer, word_span) {
            // Not a marker itself; the cursor may be inside a quoted
            // marker, so look for the enclosing quote pair on this line.
            result = self.find_enclosing_quote_span(buffer, word_span)?;
        }
        Some(result)
    }

    fn find_enclosing_quote_span(&self, buffer: &dyn TextBuffer, span: Span) -> Option<Span> {
        let text = buffer.text();
        let line = buffer.line_span_at(span.start);

        let mut left = None;
        let mut idx = span.start.min(text.len());
        while idx > line.start {
            let c = text[..idx].chars().next_back()?;
            let start = idx - c.len_utf8();
            if c == '"' {
                left = Some(start);
                break;
            }
            idx = start;
        }
        let left = left?;

        let mut right = None;
        let mut idx = span.end.min(text.len());
        while idx < line.end {
            let c = text[idx..].chars().next()?;
            if c == '"' {
                right = Some(idx + c.len_utf8());
                break;
            }
            idx += c.len_utf8();
        }
        let right = right?;

        let quote_span = Span::new(left, right);
        self.is_span_replacement(buffer, quote_span)
            .then_some(quote_span)
    }

    /// Move the reserved end marker to the caret: any existing `$end$`
    /// is removed first, then one is inserted at the caret position.
    pub fn insert_end_marker(&mut self, buffer: &mut dyn TextBuffer) {
        self.insert_special_marker(buffer, super::RESERVED_END);
    }

    /// Move the reserved selected-text marker to the caret.
    pub fn insert_selected_marker(&mut self, buffer: &mut dyn TextBuffer) {
        self.insert_special_marker(buffer, super::RESERVED_SELECTED);
    }

    fn insert_special_marker(&mut self, buffer: &mut dyn TextBuffer, name: &str) {
        let marker = self.delimited(name);
        self.replace_all(buffer, &marker, "", false);
        let caret = buffer.caret();
        if let Err(e) = buffer.insert(caret, &marker) {
            warn!(marker = %marker, error = %e, "special marker insert failed");
        }
    }

    /// Replace occurrences of `find` across the buffer in one batch.
    ///
    /// A position qualifies when `find` appears as a whole word (no word
    /// character on either side), or unconditionally when `find` is
    /// itself in delimited form. With `skip_if_already_replacement`,
    /// positions that are already markers (or marker interiors) are left
    /// alone. Returns the number of spans replaced; a rejected batch is
    /// logged and counts as zero.
    pub fn replace_all(
        &self,
        buffer: &mut dyn TextBuffer,
        find: &str,
        replace: &str,
        skip_if_already_replacement: bool,
    ) -> usize {
        if find.is_empty() {
            return 0;
        }

        let text = buffer.text().to_owned();
        let mut edits = Vec::new();
        for span in self.replaceable_spans(&text, find) {
            if skip_if_already_replacement && self.span_is_replacement(&text, span) {
                continue;
            }
            edits.push(Edit::new(span, replace));
        }

        if edits.is_empty() {
            return 0;
        }
        let count = edits.len();
        match buffer.apply_edits(&edits) {
            Ok(()) => count,
            Err(e) => {
                warn!(find, error = %e, "edit batch rejected");
                0
            }
        }
    }

    /// All whole-word (or already-delimited) occurrence spans of `find`.
    fn replaceable_spans(&self, text: &str, find: &str) -> Vec<Span> {
        let find_is_replacement = self.is_text_replacement(find);
        let mut spans = Vec::new();
        let mut from = 0;
        while let Some(pos) = text[from..].find(find) {
            let start = from + pos;
            let end = start + find.len();
            let whole_word = !text[..start].chars().next_back().is_some_and(is_word_char)
                && !text[end..].chars().next().is_some_and(is_word_char);
            if whole_word || find_is_replacement {
                spans.push(Span::new(start, end));
            }
            from = end;
        }
        spans
    }
}
