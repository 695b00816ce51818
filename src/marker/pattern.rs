//! Replacement grammar regex builders.
//!
//! Two patterns define the marker grammar. A *candidate* is text that may
//! become a replacement identifier: a bare word or a double-quoted
//! string, nothing else. An *occurrence* is a delimiter-bracketed
//! identifier in code text; its pattern uses lookaround so that runs of
//! adjacent markers (`$a$$b$`) split correctly instead of one delimiter
//! serving two markers.

use std::sync::LazyLock;

use fancy_regex::Regex as FancyRegex;
use regex::Regex;

/// An identifier body: a double-quoted string or a word.
const REPLACEMENT_PART: &str = r#"((".*")|(\w+))"#;

// The two builders expect-compile: both patterns are fixed shapes with
// the only variable input regex-escaped.
#[allow(clippy::expect_used)]
static CANDIDATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{REPLACEMENT_PART}$")).expect("candidate pattern"));

/// Anchored pattern accepting exactly one replacement identifier.
pub fn candidate_regex() -> &'static Regex {
    &CANDIDATE
}

/// The occurrence pattern source for the given delimiter.
///
/// A bracketed identifier matches if it is not preceded by another
/// delimiter, or if what precedes it is itself a complete bracketed
/// identifier (so `$a$$b$` yields `$a$` and `$b$`).
pub fn occurrence_pattern(delimiter: char) -> String {
    let d = fancy_regex::escape(&delimiter.to_string()).into_owned();
    let p = REPLACEMENT_PART;
    format!("((?<!{d}){d}{p}{d})|((?<={d}{p}{d}){d}{p}{d})")
}

/// Compiled occurrence pattern for the given delimiter.
#[allow(clippy::expect_used)]
pub fn occurrence_regex(delimiter: char) -> FancyRegex {
    FancyRegex::new(&occurrence_pattern(delimiter)).expect("occurrence pattern for delimiter")
}
