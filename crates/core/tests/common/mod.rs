#![allow(dead_code)]

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::TimeDelta;
use noshoes_core::{FileStore, LocalFileStore, ScanOutcome, StoredFile, SweepError};

/// Write `body` to `dir/name` and backdate its mtime by `age`.
pub fn write_aged(dir: &Path, name: &str, body: &str, age: TimeDelta) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, body).unwrap();
    let mtime = SystemTime::now() - age.to_std().unwrap();
    fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(mtime)
        .unwrap();
    path
}

pub fn mtime(path: &Path) -> SystemTime {
    fs::metadata(path).unwrap().modified().unwrap()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}

/// A [`FileStore`] over the real filesystem that injects failures for
/// selected file names.
#[derive(Debug, Default)]
pub struct FaultyStore {
    /// `remove` fails with permission denied.
    pub deny_remove: HashSet<String>,
    /// `stat` fails as if the file vanished.
    pub vanish: HashSet<String>,
    /// `stat` reports a newer mtime than the scan saw.
    pub rewritten: HashSet<String>,
    /// Extra delay inside `scan`.
    pub scan_delay: Option<Duration>,
}

impl FaultyStore {
    pub fn deny_remove(names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            deny_remove: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        })
    }

    pub fn vanish(names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            vanish: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        })
    }

    pub fn rewritten(names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            rewritten: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            scan_delay: Some(delay),
            ..Self::default()
        })
    }
}

impl FileStore for FaultyStore {
    fn scan(&self, root: &Path, recursive: bool) -> Result<ScanOutcome, SweepError> {
        if let Some(delay) = self.scan_delay {
            std::thread::sleep(delay);
        }
        LocalFileStore.scan(root, recursive)
    }

    fn stat(&self, path: &Path) -> Result<StoredFile, SweepError> {
        let name = file_name(path);
        if self.vanish.contains(&name) {
            return Err(SweepError::file_access(
                path,
                io::Error::from(io::ErrorKind::NotFound),
            ));
        }
        let mut file = LocalFileStore.stat(path)?;
        if self.rewritten.contains(&name) {
            file.modified += TimeDelta::seconds(1);
        }
        Ok(file)
    }

    fn remove(&self, path: &Path) -> Result<(), SweepError> {
        if self.deny_remove.contains(&file_name(path)) {
            return Err(SweepError::file_access(
                path,
                io::Error::from(io::ErrorKind::PermissionDenied),
            ));
        }
        LocalFileStore.remove(path)
    }
}
