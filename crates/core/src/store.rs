//! Filesystem access for the sweeper.
//!
//! [`FileStore`] is the only way the sweeper reads or deletes anything, so
//! tests can interpose failures without needing real permission tricks.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::SweepError;

/// One persisted track file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    /// Absolute path.
    pub path: PathBuf,
    /// Last-modified time.
    pub modified: DateTime<Utc>,
    pub size_bytes: u64,
}

/// Files found under a root plus whatever could not be read along the way.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub files: Vec<StoredFile>,
    pub errors: Vec<SweepError>,
}

/// Read/delete access to stored files.
pub trait FileStore: Send + Sync {
    /// List regular files under `root`. Symlinks and other special files are
    /// skipped. Unreadable entries below the root land in
    /// [`ScanOutcome::errors`]; an unreadable root is an `Err`.
    fn scan(&self, root: &Path, recursive: bool) -> Result<ScanOutcome, SweepError>;

    /// Current metadata of a single file.
    fn stat(&self, path: &Path) -> Result<StoredFile, SweepError>;

    fn remove(&self, path: &Path) -> Result<(), SweepError>;
}

// ---------------------------------------------------------------------------
// LocalFileStore
// ---------------------------------------------------------------------------

/// [`FileStore`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileStore;

impl LocalFileStore {
    fn scan_dir(&self, dir: &Path, recursive: bool, out: &mut ScanOutcome) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                out.errors.push(SweepError::file_access(dir, e));
                return;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    out.errors.push(SweepError::file_access(dir, e));
                    continue;
                }
            };
            let path = entry.path();

            // DirEntry::file_type does not follow symlinks.
            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(e) => {
                    out.errors.push(SweepError::file_access(&path, e));
                    continue;
                }
            };

            if file_type.is_dir() {
                if recursive {
                    self.scan_dir(&path, recursive, out);
                }
            } else if file_type.is_file() {
                match self.stat(&path) {
                    Ok(file) => out.files.push(file),
                    Err(e) => out.errors.push(e),
                }
            }
        }
    }
}

impl FileStore for LocalFileStore {
    fn scan(&self, root: &Path, recursive: bool) -> Result<ScanOutcome, SweepError> {
        fs::read_dir(root).map_err(|e| SweepError::file_access(root, e))?;
        let mut out = ScanOutcome::default();
        self.scan_dir(root, recursive, &mut out);
        Ok(out)
    }

    fn stat(&self, path: &Path) -> Result<StoredFile, SweepError> {
        let meta = fs::symlink_metadata(path).map_err(|e| SweepError::file_access(path, e))?;
        let modified = meta.modified().map_err(|e| SweepError::file_access(path, e))?;
        Ok(StoredFile {
            path: path.to_path_buf(),
            modified: DateTime::<Utc>::from(modified),
            size_bytes: meta.len(),
        })
    }

    fn remove(&self, path: &Path) -> Result<(), SweepError> {
        fs::remove_file(path).map_err(|e| SweepError::file_access(path, e))
    }
}
