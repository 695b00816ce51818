//! End-to-end scenarios over the replacement engine, the snippet file
//! format, and the index, using real temp directories.

use std::path::{Path, PathBuf};

use snipkit::{
    IndexEvent, ReplacementEngine, Settings, Snippet, SnippetFile, SnippetIndex, StringBuffer,
    TextBuffer,
};

/// Route engine/index tracing into test output when `RUST_LOG` is set.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Write a single-snippet file under `dir` and return its path.
fn write_snippet(dir: &Path, file_name: &str, title: &str, language: &str, code: &str) -> PathBuf {
    let mut snippet = Snippet::with_title(title);
    snippet.code_language = language.to_owned();
    snippet.code = code.to_owned();
    snippet.author = "tester".to_owned();

    let path = dir.join(file_name);
    let file = SnippetFile::new(&path, vec![snippet]);
    file.save().expect("snippet file should save");
    path
}

fn settings_for(dir: &Path) -> Settings {
    Settings::new(dir.join("cache").join("index.json")).with_directory(dir)
}

#[test]
fn test_rebuild_indexes_directory_tree() {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    write_snippet(dir.path(), "loop.snippet", "For Loop", "csharp", "for;;");
    std::fs::create_dir_all(dir.path().join("nested")).expect("mkdir");
    write_snippet(
        &dir.path().join("nested"),
        "prop.snippet",
        "Property",
        "csharp",
        "get; set;",
    );
    // Non-snippet files are ignored by the scan.
    std::fs::write(dir.path().join("notes.txt"), "not a snippet").expect("write");

    let index = SnippetIndex::new(settings_for(dir.path()));
    assert!(index.rebuild());

    assert_eq!(index.len(), 2);
    let all = index.search("", &["csharp"], 100);
    let titles: Vec<&str> = all.iter().map(|i| i.title.as_str()).collect();
    assert!(titles.contains(&"For Loop"));
    assert!(titles.contains(&"Property"));

    // The index file landed at the configured path.
    assert!(dir.path().join("cache").join("index.json").is_file());
}

#[test]
fn test_rebuild_skips_malformed_file_and_continues() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_snippet(dir.path(), "good.snippet", "Good", "csharp", "ok");
    std::fs::write(dir.path().join("broken.snippet"), "<CodeSnippets><oops").expect("write");

    let index = SnippetIndex::new(settings_for(dir.path()));
    assert!(index.rebuild());
    assert_eq!(index.len(), 1);
    assert_eq!(index.search("", &["csharp"], 10)[0].title, "Good");
}

#[test]
fn test_search_ranking_and_language_filter() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_snippet(dir.path(), "a.snippet", "binary search", "csharp", "loop()");
    write_snippet(
        dir.path(),
        "b.snippet",
        "Helper",
        "csharp",
        "researcher.run()",
    );
    write_snippet(dir.path(), "c.snippet", "Unrelated", "csharp", "noop()");
    write_snippet(dir.path(), "d.snippet", "search tools", "vb", "noop()");

    let index = SnippetIndex::new(settings_for(dir.path()));
    assert!(index.rebuild());

    // Whole-word title match outranks a substring match in code; the
    // non-matching item is excluded, and so is the other language.
    let results = index.search("search", &["csharp"], 10);
    let titles: Vec<&str> = results.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["binary search", "Helper"]);

    // Empty query returns everything for the language, nothing else.
    let vb_only = index.search("", &["vb"], 100);
    assert_eq!(vb_only.len(), 1);
    assert_eq!(vb_only[0].title, "search tools");
}

#[test]
fn test_update_from_file_add_update_and_remove() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_snippet(dir.path(), "multi.snippet", "First", "csharp", "one");

    let index = SnippetIndex::new(settings_for(dir.path()));
    assert!(index.rebuild());
    assert_eq!(index.len(), 1);

    // The user edited the file: First changed, Second is new.
    let mut first = Snippet::with_title("First");
    first.code_language = "csharp".to_owned();
    first.code = "one updated".to_owned();
    let mut second = Snippet::with_title("Second");
    second.code_language = "csharp".to_owned();
    second.code = "two".to_owned();
    let edited = SnippetFile::new(&path, vec![first, second]);
    assert!(index.update_from_file(&edited));

    assert_eq!(index.len(), 2);
    let results = index.search("updated", &["csharp"], 10);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "First");

    // Second save removes "Second" again.
    let mut only_first = Snippet::with_title("First");
    only_first.code_language = "csharp".to_owned();
    only_first.code = "one".to_owned();
    // A second snippet with a stale title forces the set-difference
    // removal path rather than the single-snippet rename path.
    let mut third = Snippet::with_title("Third");
    third.code_language = "csharp".to_owned();
    let edited = SnippetFile::new(&path, vec![only_first, third]);
    assert!(index.update_from_file(&edited));

    let titles: Vec<String> = index
        .search("", &["csharp"], 100)
        .into_iter()
        .map(|i| i.title)
        .collect();
    assert!(titles.contains(&"First".to_owned()));
    assert!(titles.contains(&"Third".to_owned()));
    assert!(!titles.contains(&"Second".to_owned()));
}

#[test]
fn test_single_snippet_rename_keeps_historical_metadata() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_snippet(dir.path(), "renamed.snippet", "Old Title", "csharp", "code");

    // Seed an index file carrying historical metadata for the snippet.
    let index_path = dir.path().join("cache").join("index.json");
    std::fs::create_dir_all(index_path.parent().expect("parent")).expect("mkdir");
    let seeded = serde_json::json!([{
        "title": "Old Title",
        "author": "tester",
        "description": "",
        "code": "code",
        "keywords": "",
        "language": "csharp",
        "file": path.display().to_string(),
        "delimiter": "$",
        "dateAdded": "2019-04-02",
        "usesNum": 7
    }]);
    std::fs::write(&index_path, seeded.to_string()).expect("write index");

    let index = SnippetIndex::new(settings_for(dir.path()));
    assert!(index.load());

    // The file's only snippet was renamed.
    let mut renamed = Snippet::with_title("New Title");
    renamed.code_language = "csharp".to_owned();
    renamed.code = "code".to_owned();
    let edited = SnippetFile::new(&path, vec![renamed]);
    assert!(index.update_from_file(&edited));

    let results = index.search("", &["csharp"], 10);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "New Title");
    // Historical metadata survived the rename.
    assert_eq!(results[0].uses_num, 7);
    assert_eq!(results[0].date_added, "2019-04-02");
}

#[test]
fn test_delete_removes_file_and_entry() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_snippet(dir.path(), "gone.snippet", "Doomed", "csharp", "x");

    let index = SnippetIndex::new(settings_for(dir.path()));
    assert!(index.rebuild());
    assert_eq!(index.len(), 1);

    index
        .delete(&path.display().to_string(), "Doomed")
        .expect("delete should succeed");

    assert!(!path.exists());
    assert_eq!(index.len(), 0);
}

#[test]
fn test_load_prunes_records_for_missing_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let keep = write_snippet(dir.path(), "keep.snippet", "Keep", "csharp", "x");
    let removed = write_snippet(dir.path(), "drop.snippet", "Drop", "csharp", "y");

    let first = SnippetIndex::new(settings_for(dir.path()));
    assert!(first.rebuild());
    assert_eq!(first.len(), 2);

    // The backing file for one record disappears between sessions.
    std::fs::remove_file(&removed).expect("remove");

    let second = SnippetIndex::new(settings_for(dir.path()));
    assert!(second.load());
    assert_eq!(second.len(), 1);
    assert_eq!(
        second.search("", &["csharp"], 10)[0].file,
        keep.display().to_string()
    );
}

#[test]
fn test_load_missing_index_file_is_false_not_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let index = SnippetIndex::new(settings_for(dir.path()));
    assert!(!index.load());
    assert!(index.is_empty());
    assert!(!index.is_loading());
}

#[test]
fn test_rebuild_refused_from_inside_rebuild() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_snippet(dir.path(), "one.snippet", "One", "csharp", "x");

    let index = std::sync::Arc::new(SnippetIndex::new(settings_for(dir.path())));
    let inner = std::sync::Arc::clone(&index);
    let reentrant_result = std::sync::Arc::new(std::sync::Mutex::new(None));
    let seen = std::sync::Arc::clone(&reentrant_result);

    index.set_listener(move |event| {
        if event == IndexEvent::UpdatingChanged(true) {
            // A second rebuild requested while one is running is a
            // guarded no-op.
            *seen.lock().expect("lock") = Some(inner.rebuild());
        }
    });

    assert!(index.rebuild());
    assert_eq!(*reentrant_result.lock().expect("lock"), Some(false));
    assert_eq!(index.len(), 1);
}

#[test]
fn test_edit_then_save_then_reindex_workflow() {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_snippet(
        dir.path(),
        "method.snippet",
        "Method Stub",
        "csharp",
        "public $type$ name() { }",
    );

    // Open the file, drive the engine over its code.
    let mut file = SnippetFile::load(&path).expect("load");
    let snippet = &file.snippets[0];
    let mut engine = ReplacementEngine::from_snippet(snippet);
    let mut buffer = StringBuffer::new(snippet.code.clone());

    // Pick up the marker typed directly into the code...
    engine.scan_and_reconcile(&mut buffer);
    assert_eq!(engine.records().len(), 1);
    // ...and turn `name` into a second replacement.
    assert!(engine.create_replacement(&mut buffer, "name"));
    assert_eq!(buffer.text(), "public $type$ $name$() { }");

    // Push the edits back into the snippet and save.
    file.snippets[0].code = buffer.text().to_owned();
    file.snippets[0].literals = engine.records().to_vec();
    file.save().expect("save");

    // Index the result incrementally and find it by its new marker.
    let index = SnippetIndex::new(settings_for(dir.path()));
    let reloaded = SnippetFile::load(&path).expect("reload");
    assert_eq!(reloaded.snippets[0].literals.len(), 2);
    assert!(index.update_from_file(&reloaded));

    let results = index.search("name", &["csharp"], 10);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "Method Stub");
    assert!(results[0].code.contains("$name$"));
}
