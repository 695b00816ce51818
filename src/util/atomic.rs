//! Atomic file writing via tempfile + rename.
//!
//! The index file is written to a temporary file in the target's
//! directory and then renamed over it, so a crash mid-write leaves the
//! previous index intact. Parent directories are created on demand (the
//! index may live under a path that does not exist yet on first run).

use std::io::Write;
use std::path::Path;

use crate::error::{SnipError, SnipResult};

/// Atomically write `contents` to `path`, creating parent directories.
pub fn atomic_write(path: &Path, contents: &[u8]) -> SnipResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| SnipError::io(parent, e))?;

    let mut tmp =
        tempfile::NamedTempFile::new_in(parent).map_err(|e| SnipError::io(parent, e))?;
    tmp.write_all(contents)
        .map_err(|e| SnipError::io(path, e))?;
    tmp.flush().map_err(|e| SnipError::io(path, e))?;
    tmp.persist(path).map_err(|e| SnipError::io(path, e.error))?;

    Ok(())
}
