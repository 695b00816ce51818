//! Snapshot-based marker highlight recompute.
//!
//! A host asks for the set of marker spans to decorate whenever the
//! buffer changes. The scan is a full-text regex pass and may run on a
//! worker thread against an immutable snapshot; only the newest request
//! is allowed to publish. A scan that finishes after a newer request was
//! issued discards its own result, so rapid typing never queues a
//! backlog and stale spans never replace fresh ones.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::buffer::Span;
use crate::marker::pattern;

/// Latest-request-wins publisher of marker occurrence spans.
#[derive(Debug, Default)]
pub struct HighlightScanner {
    generation: AtomicU64,
    published: Mutex<Arc<Vec<Span>>>,
}

impl HighlightScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new scan request, invalidating all earlier ones.
    ///
    /// Returns the token to pass to [`Self::scan_and_publish`].
    pub fn request(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Scan `snapshot` for marker occurrences and publish the result if
    /// `token` is still the newest request.
    ///
    /// Returns true when the result was published, false when a newer
    /// request superseded this one and the result was discarded.
    pub fn scan_and_publish(&self, token: u64, delimiter: char, snapshot: &str) -> bool {
        let spans = compute_spans(delimiter, snapshot);

        let mut published = self
            .published
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Re-check under the lock so two finishing scans serialize.
        if self.generation.load(Ordering::SeqCst) != token {
            return false;
        }
        *published = Arc::new(spans);
        true
    }

    /// The most recently published highlight set.
    pub fn current(&self) -> Arc<Vec<Span>> {
        Arc::clone(
            &self
                .published
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}

/// All marker occurrence spans in `snapshot` for the given delimiter.
///
/// Pure function; spans are byte offsets into `snapshot`. Positions where
/// the backtracking scan fails are skipped rather than aborting the pass.
pub fn compute_spans(delimiter: char, snapshot: &str) -> Vec<Span> {
    pattern::occurrence_regex(delimiter)
        .find_iter(snapshot)
        .filter_map(Result::ok)
        .map(|m| Span::new(m.start(), m.end()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_spans_finds_all_markers() {
        let spans = compute_spans('$', "public $type$ $name$() { }");
        assert_eq!(spans, vec![Span::new(7, 13), Span::new(14, 20)]);
    }

    #[test]
    fn test_publish_latest_request_wins() {
        let scanner = HighlightScanner::new();
        let stale = scanner.request();
        let fresh = scanner.request();

        // The stale scan finishes last but must not publish.
        assert!(scanner.scan_and_publish(fresh, '$', "one $a$"));
        assert!(!scanner.scan_and_publish(stale, '$', "outdated $b$ text"));

        let spans = scanner.current();
        assert_eq!(*spans, vec![Span::new(4, 7)]);
    }

    #[test]
    fn test_current_starts_empty() {
        let scanner = HighlightScanner::new();
        assert!(scanner.current().is_empty());
    }
}
