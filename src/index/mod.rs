//! Snippet index and ranked search.
//!
//! A flat, persisted, in-memory catalog of snippet metadata keyed by
//! `UPPER(path)|UPPER(title)`. Supports incremental upsert/delete after
//! saves, bulk rebuild by recursive directory scan, and a weighted
//! multi-field ranked search. One coarse mutex guards the backing map;
//! rebuild refuses to start while a rebuild or load is already running,
//! so the guard holds regardless of caller discipline.

pub mod item;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::config::{SNIPPET_FILE_GLOB, Settings};
use crate::error::{SnipError, SnipResult};
use crate::model::{Snippet, SnippetFile};
use crate::util::atomic::atomic_write;

pub use item::{SnippetIndexItem, composite_key, key_prefix};

/// State-change notifications observable by a host for UI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexEvent {
    LoadingChanged(bool),
    UpdatingChanged(bool),
}

type Listener = std::sync::Arc<dyn Fn(IndexEvent) + Send + Sync>;

type FieldExtractor = for<'a> fn(&'a SnippetIndexItem) -> Cow<'a, str>;

fn extract_title(item: &SnippetIndexItem) -> Cow<'_, str> {
    Cow::Borrowed(&item.title)
}

fn extract_code(item: &SnippetIndexItem) -> Cow<'_, str> {
    Cow::Borrowed(&item.code)
}

fn extract_description(item: &SnippetIndexItem) -> Cow<'_, str> {
    Cow::Borrowed(&item.description)
}

fn extract_keywords(item: &SnippetIndexItem) -> Cow<'_, str> {
    Cow::Borrowed(&item.keywords)
}

fn extract_file_stem(item: &SnippetIndexItem) -> Cow<'_, str> {
    Cow::Owned(item.file_stem())
}

/// Ranked search fields and their weights. Order only affects tie-break
/// stability, not scoring.
const FIELD_RANKINGS: &[(FieldExtractor, f64)] = &[
    (extract_title, 10.0),
    (extract_code, 5.0),
    (extract_description, 3.0),
    (extract_keywords, 2.0),
    (extract_file_stem, 2.0),
];

/// Weight of a whole-word match relative to a field's weight.
const WHOLE_WORD_WEIGHT: f64 = 1.0;

/// Weight of a bare substring match relative to a field's weight.
const SUBSTRING_WEIGHT: f64 = 0.1;

/// The searchable snippet catalog.
pub struct SnippetIndex {
    items: Mutex<BTreeMap<String, SnippetIndexItem>>,
    settings: Settings,
    is_loading: AtomicBool,
    is_updating: AtomicBool,
    listener: Mutex<Option<Listener>>,
}

impl std::fmt::Debug for SnippetIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnippetIndex")
            .field("settings", &self.settings)
            .field("is_loading", &self.is_loading)
            .field("is_updating", &self.is_updating)
            .finish_non_exhaustive()
    }
}

impl SnippetIndex {
    pub fn new(settings: Settings) -> Self {
        Self {
            items: Mutex::new(BTreeMap::new()),
            settings,
            is_loading: AtomicBool::new(false),
            is_updating: AtomicBool::new(false),
            listener: Mutex::new(None),
        }
    }

    /// Register the observer for loading/updating transitions. Replaces
    /// any previous listener.
    pub fn set_listener(&self, listener: impl Fn(IndexEvent) + Send + Sync + 'static) {
        *self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(std::sync::Arc::new(listener));
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading.load(Ordering::SeqCst)
    }

    pub fn is_updating(&self) -> bool {
        self.is_updating.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.lock_items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_items().is_empty()
    }

    fn lock_items(&self) -> MutexGuard<'_, BTreeMap<String, SnippetIndexItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, event: IndexEvent) {
        // Clone out so the listener runs without the lock held; a
        // listener may call back into the index.
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(listener) = listener {
            listener(event);
        }
    }

    fn set_loading(&self, value: bool) {
        if self.is_loading.swap(value, Ordering::SeqCst) != value {
            self.notify(IndexEvent::LoadingChanged(value));
        }
    }

    fn set_updating(&self, value: bool) {
        if self.is_updating.swap(value, Ordering::SeqCst) != value {
            self.notify(IndexEvent::UpdatingChanged(value));
        }
    }

    /// Search the catalog, ranked.
    ///
    /// Items are filtered to `languages` first (case-insensitive). An
    /// empty query returns up to `max_results` items in key order. A
    /// non-empty query scores every item per ranked field: a whole-word
    /// match adds the field weight, a substring match a tenth of it;
    /// results sort by score descending, composite key ascending.
    pub fn search(
        &self,
        query: &str,
        languages: &[&str],
        max_results: usize,
    ) -> Vec<SnippetIndexItem> {
        let items = self.lock_items();
        let language_ok = |item: &SnippetIndexItem| {
            languages
                .iter()
                .any(|lang| lang.eq_ignore_ascii_case(&item.language))
        };

        if query.is_empty() {
            return items
                .values()
                .filter(|item| language_ok(item))
                .take(max_results)
                .cloned()
                .collect();
        }

        let escaped = regex::escape(query);
        let match_rankings: Vec<(regex::Regex, f64)> = [
            (format!(r"\b{escaped}\b"), WHOLE_WORD_WEIGHT),
            (escaped, SUBSTRING_WEIGHT),
        ]
        .into_iter()
        .filter_map(|(pattern, weight)| {
            regex::RegexBuilder::new(&pattern)
                .case_insensitive(true)
                .build()
                .ok()
                .map(|re| (re, weight))
        })
        .collect();

        let mut scored: Vec<(f64, &String, &SnippetIndexItem)> = items
            .iter()
            .filter(|(_, item)| language_ok(item))
            .filter_map(|(key, item)| {
                let mut score = 0.0;
                for (extract, field_weight) in FIELD_RANKINGS {
                    let field = extract(item);
                    for (re, match_weight) in &match_rankings {
                        if re.is_match(&field) {
                            score += field_weight * match_weight;
                        }
                    }
                }
                (score > 0.0).then_some((score, key, item))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(b.1))
        });

        scored
            .into_iter()
            .take(max_results)
            .map(|(_, _, item)| item.clone())
            .collect()
    }

    /// Insert or update the record for `snippet` under `file_path`.
    ///
    /// An existing record keeps its historical metadata and gets its
    /// searchable fields overwritten; otherwise a fresh record is
    /// inserted. Does not persist.
    pub fn upsert(&self, snippet: &Snippet, file_path: &Path) {
        let file = file_path.display().to_string();
        let key = composite_key(&file, &snippet.title);
        let mut items = self.lock_items();
        match items.get_mut(&key) {
            Some(item) => {
                item.update_from(snippet);
                self.apply_default_language(item);
            }
            None => {
                let mut item = SnippetIndexItem::from_snippet(snippet, file_path);
                self.apply_default_language(&mut item);
                items.insert(key, item);
            }
        }
    }

    /// Snippets that declare no language index under the configured
    /// default.
    fn apply_default_language(&self, item: &mut SnippetIndexItem) {
        if item.language.is_empty() {
            item.language = self.settings.default_language.clone();
        }
    }

    /// Delete a snippet: best-effort removal of the backing file, then
    /// unconditional removal of the index entry, then persist.
    ///
    /// Fails only on empty arguments. A file that is already gone is not
    /// an error; a file that cannot be deleted is logged and the index
    /// entry is removed anyway.
    pub fn delete(&self, file_path: &str, title: &str) -> SnipResult<()> {
        if file_path.is_empty() {
            return Err(SnipError::EmptyArgument { name: "file_path" });
        }
        if title.is_empty() {
            return Err(SnipError::EmptyArgument { name: "title" });
        }

        let path = Path::new(file_path);
        if path.exists() {
            if let Err(e) = std::fs::remove_file(path) {
                warn!(file = file_path, error = %e, "snippet file delete failed");
            }
        }

        self.lock_items().remove(&composite_key(file_path, title));
        self.persist();
        Ok(())
    }

    /// Rebuild the whole catalog from the configured directories.
    ///
    /// Clears the in-memory index, recursively scans each directory for
    /// snippet files, parses and upserts every contained snippet, then
    /// persists. Returns false without doing anything when a rebuild or
    /// load is already in progress; per-file parse failures are logged
    /// and skipped.
    pub fn rebuild(&self) -> bool {
        self.rebuild_from_directories(&self.settings.snippet_directories)
    }

    /// [`Self::rebuild`] over an explicit directory list.
    pub fn rebuild_from_directories(&self, directories: &[PathBuf]) -> bool {
        if self.is_loading() {
            debug!("rebuild refused: index load in progress");
            return false;
        }
        if self.is_updating.swap(true, Ordering::SeqCst) {
            debug!("rebuild refused: rebuild already in progress");
            return false;
        }
        self.notify(IndexEvent::UpdatingChanged(true));

        self.lock_items().clear();
        for directory in directories {
            if !directory.is_dir() {
                continue;
            }
            for file in snippet_files_under(directory) {
                match SnippetFile::load(&file) {
                    Ok(snippet_file) => {
                        for snippet in &snippet_file.snippets {
                            self.upsert(snippet, &file);
                        }
                    }
                    Err(e) => {
                        warn!(file = %file.display(), error = %e, "skipping unreadable snippet file");
                    }
                }
            }
        }

        self.set_updating(false);
        self.persist()
    }

    /// Incremental sync after a snippet file was saved.
    ///
    /// Records matching a contained title are updated in place. New
    /// titles are added; previously indexed titles no longer in the file
    /// are found by key-prefix set difference and removed. When the file
    /// holds exactly one snippet and exactly one key went stale, the
    /// stale record is re-keyed instead, carrying its historical
    /// metadata across the rename. Persists on completion.
    pub fn update_from_file(&self, snippet_file: &SnippetFile) -> bool {
        let file = snippet_file.path().display().to_string();
        let prefix = key_prefix(&file);

        {
            let mut items = self.lock_items();
            let mut found: Vec<String> = Vec::new();
            let mut to_add: Vec<&Snippet> = Vec::new();

            for snippet in &snippet_file.snippets {
                let key = composite_key(&file, &snippet.title);
                match items.get_mut(&key) {
                    Some(item) => {
                        item.update_from(snippet);
                        self.apply_default_language(item);
                        found.push(key);
                    }
                    None => to_add.push(snippet),
                }
            }

            if !to_add.is_empty() {
                let stale: Vec<String> = items
                    .keys()
                    .filter(|key| key.starts_with(&prefix) && !found.contains(*key))
                    .cloned()
                    .collect();

                if snippet_file.snippets.len() == 1 && stale.len() == 1 && to_add.len() == 1 {
                    // The file's only snippet was renamed: re-key the
                    // existing record so date_added/uses_num survive.
                    if let Some(mut item) = items.remove(&stale[0]) {
                        item.update_from(to_add[0]);
                        self.apply_default_language(&mut item);
                        items.insert(item.key(), item);
                    }
                } else {
                    for key in &stale {
                        items.remove(key);
                    }
                    for snippet in to_add {
                        let key = composite_key(&file, &snippet.title);
                        let mut item =
                            SnippetIndexItem::from_snippet(snippet, snippet_file.path());
                        self.apply_default_language(&mut item);
                        items.insert(key, item);
                    }
                }
            }
        }

        self.persist()
    }

    /// Load the catalog from the configured index file.
    ///
    /// Returns false when the file is missing, unreadable, or holds no
    /// records. Records whose backing snippet file no longer exists are
    /// silently dropped. Never replaces records already present.
    pub fn load(&self) -> bool {
        self.set_loading(true);
        let result = self.load_inner();
        self.set_loading(false);
        result
    }

    fn load_inner(&self) -> bool {
        let path = &self.settings.index_file_path;
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "unable to open snippet index file");
                return false;
            }
        };
        let loaded: Vec<SnippetIndexItem> = match serde_json::from_slice(&bytes) {
            Ok(items) => items,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "unable to parse snippet index file");
                return false;
            }
        };
        if loaded.is_empty() {
            return false;
        }

        let mut items = self.lock_items();
        for item in loaded {
            // Prune records whose snippet file is gone.
            if Path::new(&item.file).exists() {
                items.entry(item.key()).or_insert(item);
            }
        }
        true
    }

    /// Write the catalog to the configured index file atomically.
    ///
    /// Failures are logged and reported as false, never raised.
    pub fn persist(&self) -> bool {
        let records: Vec<SnippetIndexItem> = self.lock_items().values().cloned().collect();
        let json = match serde_json::to_vec_pretty(&records) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "unable to serialize snippet index");
                return false;
            }
        };

        let path = &self.settings.index_file_path;
        match atomic_write(path, &json) {
            Ok(()) => true,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "unable to write snippet index file");
                false
            }
        }
    }
}

/// Maximum recursion depth for the snippet file walker.
const MAX_WALK_DEPTH: usize = 50;

/// Recursively collect snippet files under `root`, sorted for
/// deterministic rebuild order. Hidden directories are skipped and
/// symlinks are never followed.
fn snippet_files_under(root: &Path) -> Vec<PathBuf> {
    let matcher = match globset::GlobBuilder::new(SNIPPET_FILE_GLOB)
        .literal_separator(false)
        .build()
    {
        Ok(glob) => glob.compile_matcher(),
        Err(e) => {
            warn!(error = %e, "invalid snippet file glob");
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    collect_snippet_files(root, root, &matcher, &mut files, 0);
    files.sort();
    files
}

fn collect_snippet_files(
    root: &Path,
    dir: &Path,
    matcher: &globset::GlobMatcher,
    files: &mut Vec<PathBuf>,
    depth: usize,
) {
    if depth > MAX_WALK_DEPTH {
        return;
    }

    let Ok(entries) = std::fs::read_dir(dir) else {
        warn!(dir = %dir.display(), "failed to read snippet directory");
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();

        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.starts_with('.') {
                continue;
            }
        }

        // Use entry.file_type() which does NOT follow symlinks.
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            collect_snippet_files(root, &path, matcher, files, depth + 1);
        } else if file_type.is_file() {
            if let Ok(relative) = path.strip_prefix(root) {
                if matcher.is_match(relative) {
                    files.push(path);
                }
            }
        }
        // Symlinks are skipped.
    }
}
