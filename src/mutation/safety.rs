//! File safety mechanisms for mutation testing.
//!
//! Provides RAII-based guards to ensure source files are always restored
//! to their original state, even if a panic occurs during mutation testing.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::NamedTempFile;

use crate::core::{Error, Result};

/// RAII guard that ensures a file is restored to its original content.
///
/// The original is copied to a uniquely named sibling backup when the guard
/// is created. When the guard is dropped (whether normally or due to panic),
/// the original content is put back and the backup is removed.
pub struct MutationGuard {
    /// Path to the file being mutated.
    path: PathBuf,
    /// Original file content.
    original: Vec<u8>,
    /// Sibling backup, deleted when the guard goes away.
    backup: NamedTempFile,
    /// Whether the file has been modified.
    modified: bool,
}

impl MutationGuard {
    /// Back up `path` and return a guard for it.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let original = fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound { path: path.clone() },
            _ => Error::Io(e),
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut backup = tempfile::Builder::new()
            .prefix(&format!(".{name}."))
            .suffix(".bak")
            .tempfile_in(parent_dir(&path))?;
        backup.write_all(&original)?;
        backup.as_file().sync_all()?;

        Ok(Self {
            path,
            original,
            backup,
            modified: false,
        })
    }

    /// Write the mutated source in place of the original.
    pub fn apply(&mut self, content: &[u8]) -> Result<()> {
        self.modified = true;
        atomic_write(&self.path, content)
    }

    /// Get the original file content.
    pub fn original(&self) -> &[u8] {
        &self.original
    }

    /// Get the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Location of the backup copy.
    pub fn backup_path(&self) -> &Path {
        self.backup.path()
    }

    /// Check if the file has been modified.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Put the backed-up content back without dropping the guard.
    pub fn restore(&mut self) -> Result<()> {
        if self.modified {
            let content = fs::read(self.backup.path()).unwrap_or_else(|_| self.original.clone());
            atomic_write(&self.path, &content)?;
            self.modified = false;
        }
        Ok(())
    }
}

impl Drop for MutationGuard {
    fn drop(&mut self) {
        if self.modified {
            // Best-effort restoration - we can't propagate errors from drop
            if atomic_write(&self.path, &self.original).is_err() {
                let _ = fs::write(&self.path, &self.original);
            }
        }
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Write content to a file atomically.
///
/// This writes to a temporary file in the same directory first, then renames
/// it over the target, so the file is never in a partially-written state.
pub fn atomic_write(path: impl AsRef<Path>, content: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let mut temp = NamedTempFile::new_in(parent_dir(path))?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    if let Ok(metadata) = fs::metadata(path) {
        let _ = fs::set_permissions(temp.path(), metadata.permissions());
    }

    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Per-file locks, so only one worker holds a given file mutated at a time.
#[derive(Default)]
pub struct FileLocks {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl FileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the lock for a file path, creating it on first use.
    pub fn get(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(path.to_path_buf()).or_default())
    }

    /// Number of files seen so far.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
