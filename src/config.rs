//! Host-injected configuration.
//!
//! The index and any future host wiring receive a [`Settings`] value built
//! by the embedding application. Nothing in this crate reads ambient
//! global state.

use std::path::PathBuf;

/// File extension of snippet files (without the leading dot).
pub const SNIPPET_EXTENSION: &str = "snippet";

/// Glob pattern matching snippet files anywhere under a directory.
pub const SNIPPET_FILE_GLOB: &str = "**/*.snippet";

/// Configuration supplied by the host application.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Where the serialized index file lives.
    pub index_file_path: PathBuf,
    /// Directories scanned recursively for snippet files on rebuild.
    pub snippet_directories: Vec<PathBuf>,
    /// Language assigned to snippets that declare none.
    pub default_language: String,
}

impl Settings {
    /// Create settings with the given index file path and no directories.
    pub fn new(index_file_path: impl Into<PathBuf>) -> Self {
        Self {
            index_file_path: index_file_path.into(),
            snippet_directories: Vec::new(),
            default_language: String::new(),
        }
    }

    /// Add a directory to scan for snippet files.
    #[must_use]
    pub fn with_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snippet_directories.push(dir.into());
        self
    }

    /// Set the fallback language for snippets that declare none.
    #[must_use]
    pub fn with_default_language(mut self, language: impl Into<String>) -> Self {
        self.default_language = language.into();
        self
    }
}
