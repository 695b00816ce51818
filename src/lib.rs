//! `snipkit` — snippet replacement-marker engine and ranked snippet index.
//!
//! Code snippets carry parameterized placeholders ("replacements") that
//! the insertion host prompts the user to fill in. In text they appear
//! delimiter-wrapped (`$name$` by default); alongside the text lives a
//! metadata row per identifier (tooltip, default value, editable flag).
//! This crate keeps the two in sync and makes the snippet catalog
//! searchable.
//!
//! # Subsystems
//!
//! - [`marker`] — the replacement engine: validates identifiers, creates
//!   and renames markers across a text buffer, reconciles markers the
//!   user typed by hand, and computes highlight spans.
//! - [`index`] — the snippet catalog: incremental upsert/delete, bulk
//!   rebuild by directory scan, weighted multi-field ranked search, and
//!   JSON persistence.
//! - [`model`] / [`format`] — plain snippet records and their
//!   CodeSnippets XML file representation.
//! - [`buffer`] — the text-buffer seam a host editor implements.
//!
//! # Architecture
//!
//! ```text
//! host editor ──edits/queries──▶ ReplacementEngine ──batch edits──▶ TextBuffer
//!      │                                                               ▲
//!      │ saves                                                         │
//!      ▼                                                               │
//! SnippetFile ◀──XML──▶ format          HighlightScanner ──spans───────┘
//!      │
//!      ▼ upsert/rebuild
//! SnippetIndex ──ranked results──▶ host search UI
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod format;
pub mod index;
pub mod marker;
pub mod model;
pub mod util;

pub use buffer::{Edit, Span, StringBuffer, TextBuffer};
pub use config::Settings;
pub use error::{SnipError, SnipResult};
pub use index::{IndexEvent, SnippetIndex, SnippetIndexItem};
pub use marker::{HighlightScanner, ReplacementEngine};
pub use model::{AlternativeShortcut, Literal, Snippet, SnippetFile};
