//! In-memory snippet records.
//!
//! These are plain data structs; the XML representation only exists at
//! the [`crate::format`] load/save boundary. The replacement engine works
//! on [`Literal`] rows and code text and never sees XML.

use std::path::{Path, PathBuf};

use crate::error::SnipResult;
use crate::format;

/// Default marker delimiter character.
pub const DEFAULT_DELIMITER: char = '$';

/// Placeholder value shown in the Type column of a literal replacement,
/// where a type is meaningless. Hosts render it read-only.
pub const LITERAL_TYPE_SENTINEL: &str = "*";

/// Snippet type for plain expansion snippets.
pub const SNIPPET_TYPE_EXPANSION: &str = "Expansion";

/// Snippet type for surrounds-with snippets.
pub const SNIPPET_TYPE_SURROUNDS_WITH: &str = "SurroundsWith";

/// One row of replacement metadata: a literal or object replacement tied
/// to a marker identifier in the snippet code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    /// Marker identifier, unique within a snippet, case-sensitive.
    pub id: String,
    pub tooltip: String,
    pub default_value: String,
    /// Transformation expression reference, usually empty.
    pub function: String,
    /// Object replacement (typed reference) rather than a literal string.
    pub is_object: bool,
    pub editable: bool,
    /// Type of an object replacement; the sentinel for literals.
    pub type_name: String,
}

impl Literal {
    /// A fresh literal replacement for `id`, mirroring the identifier
    /// into tooltip and default value.
    pub fn for_identifier(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            tooltip: id.clone(),
            default_value: id.clone(),
            function: String::new(),
            is_object: false,
            editable: true,
            type_name: LITERAL_TYPE_SENTINEL.to_owned(),
            id,
        }
    }

    /// An object replacement with the given type.
    pub fn object(id: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            is_object: true,
            type_name: type_name.into(),
            ..Self::for_identifier(id)
        }
    }
}

/// Additional shortcut under which a snippet can be invoked.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AlternativeShortcut {
    pub name: String,
    pub value: String,
}

impl AlternativeShortcut {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One unit of exportable code with its header metadata and replacement
/// declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub title: String,
    pub author: String,
    pub description: String,
    pub help_url: String,
    pub shortcut: String,
    pub alternative_shortcuts: Vec<AlternativeShortcut>,
    pub keywords: Vec<String>,
    pub imports: Vec<String>,
    pub references: Vec<String>,
    /// E.g. `Expansion`, `SurroundsWith`.
    pub snippet_types: Vec<String>,
    pub code_language: String,
    pub code_kind: String,
    code_delimiter: char,
    pub code: String,
    pub literals: Vec<Literal>,
}

impl Default for Snippet {
    fn default() -> Self {
        Self {
            title: String::new(),
            author: String::new(),
            description: String::new(),
            help_url: String::new(),
            shortcut: String::new(),
            alternative_shortcuts: Vec::new(),
            keywords: Vec::new(),
            imports: Vec::new(),
            references: Vec::new(),
            snippet_types: vec![SNIPPET_TYPE_EXPANSION.to_owned()],
            code_language: String::new(),
            code_kind: String::new(),
            code_delimiter: DEFAULT_DELIMITER,
            code: String::new(),
            literals: Vec::new(),
        }
    }
}

impl Snippet {
    /// A blank expansion snippet with the given title.
    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub const fn delimiter(&self) -> char {
        self.code_delimiter
    }

    /// Set the marker delimiter character.
    pub const fn set_delimiter(&mut self, delimiter: char) {
        self.code_delimiter = delimiter;
    }

    /// Set the delimiter from its serialized form. Empty or multi-char
    /// strings fall back to the default delimiter.
    pub fn set_delimiter_str(&mut self, delimiter: &str) {
        let mut chars = delimiter.chars();
        self.code_delimiter = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => DEFAULT_DELIMITER,
        };
    }

    /// Look up a replacement row by identifier (case-sensitive).
    pub fn literal(&self, id: &str) -> Option<&Literal> {
        self.literals.iter().find(|l| l.id == id)
    }
}

/// A snippet file: one on-disk XML document holding one or more snippets
/// with distinct titles.
#[derive(Debug, Clone, Default)]
pub struct SnippetFile {
    path: PathBuf,
    pub snippets: Vec<Snippet>,
}

impl SnippetFile {
    /// An unsaved file that will serialize to `path`.
    pub fn new(path: impl Into<PathBuf>, snippets: Vec<Snippet>) -> Self {
        Self {
            path: path.into(),
            snippets,
        }
    }

    /// Parse the snippet file at `path`.
    pub fn load(path: impl Into<PathBuf>) -> SnipResult<Self> {
        let path = path.into();
        let snippets = format::read_snippet_file(&path)?;
        Ok(Self { path, snippets })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Titles of all contained snippets, in document order.
    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.snippets.iter().map(|s| s.title.as_str())
    }

    /// Serialize back to the file's own path.
    pub fn save(&self) -> SnipResult<()> {
        format::write_snippet_file(&self.path, &self.snippets)
    }

    /// Serialize to a new path and adopt it.
    pub fn save_as(&mut self, path: impl Into<PathBuf>) -> SnipResult<()> {
        let path = path.into();
        format::write_snippet_file(&path, &self.snippets)?;
        self.path = path;
        Ok(())
    }
}
