//! Error types for the snipkit crate.

use std::path::PathBuf;

/// Snipkit-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum SnipError {
    /// A snippet file could not be parsed as a CodeSnippets document.
    #[error("malformed snippet file {path}: {reason}")]
    MalformedSnippetFile { path: PathBuf, reason: String },

    /// A required argument was empty (e.g. delete with an empty title).
    #[error("argument must not be empty: {name}")]
    EmptyArgument { name: &'static str },

    /// A batch of buffer edits was rejected before application.
    #[error("invalid edit batch: {reason}")]
    BufferEdit { reason: String },

    /// XML reading/writing error from the snippet file layer.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// JSON serialization/deserialization error from index persistence.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error with context.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SnipError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience result type for snipkit operations.
pub type SnipResult<T> = Result<T, SnipError>;
