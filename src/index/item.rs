//! Snippet index records and their composite key.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::Snippet;

/// Denormalized search record for one snippet in one file.
///
/// Owned exclusively by the index; hosts receive clones from search
/// results. `date_added` and `uses_num` are historical metadata carried
/// across updates and renames, never derived from the snippet itself.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetIndexItem {
    pub title: String,
    pub author: String,
    pub description: String,
    pub code: String,
    /// Comma-joined keyword list.
    pub keywords: String,
    pub language: String,
    /// Path of the backing snippet file.
    pub file: String,
    pub delimiter: String,
    #[serde(default)]
    pub date_added: String,
    #[serde(default)]
    pub uses_num: u64,
}

impl SnippetIndexItem {
    /// Build a fresh record from a snippet in `file_path`.
    pub fn from_snippet(snippet: &Snippet, file_path: &Path) -> Self {
        let mut item = Self {
            file: file_path.display().to_string(),
            ..Self::default()
        };
        item.update_from(snippet);
        item
    }

    /// Overwrite the searchable fields from `snippet`, leaving the file
    /// path and historical metadata in place.
    pub fn update_from(&mut self, snippet: &Snippet) {
        self.title = snippet.title.clone();
        self.author = snippet.author.clone();
        self.description = snippet.description.clone();
        self.keywords = snippet.keywords.join(",");
        self.language = snippet.code_language.clone();
        self.code = snippet.code.clone();
        self.delimiter = snippet.delimiter().to_string();
    }

    /// This record's key in the index.
    pub fn key(&self) -> String {
        composite_key(&self.file, &self.title)
    }

    /// The backing file's name without its extension, a ranked search
    /// field.
    pub fn file_stem(&self) -> String {
        Path::new(&self.file)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Index key addressing one snippet record: upper-cased, trimmed file
/// path and title joined with `|`.
pub fn composite_key(file_path: &str, title: &str) -> String {
    let file = file_path.to_uppercase();
    let title = title.to_uppercase();
    format!("{}|{}", file.trim(), title.trim())
}

/// Prefix shared by all keys under one file.
pub fn key_prefix(file_path: &str) -> String {
    let file = file_path.to_uppercase();
    format!("{}|", file.trim())
}
