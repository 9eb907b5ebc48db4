//! Retention sweeper.
//!
//! A [`Sweeper`] is bound to one storage directory and one retention policy.
//! [`Sweeper::run_once`] performs a single synchronous pass; scheduling lives
//! in [`crate::handle`].

use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, TryLockError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::clock::{Clock, SystemClock};
use crate::error::SweepError;
use crate::report::{RetentionPreview, StorageStats, SweepResult};
use crate::schedule::SweepSchedule;
use crate::store::{FileStore, LocalFileStore, StoredFile};

/// Longest time the schedule loop sleeps before re-reading the clock.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// RetentionPolicy
// ---------------------------------------------------------------------------

/// Which files are considered and how old they may get.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    storage_root: PathBuf,
    max_age: TimeDelta,
    recursive: bool,
    extension: Option<String>,
}

impl RetentionPolicy {
    /// Canonical (absolute) storage root.
    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    pub fn max_age(&self) -> TimeDelta {
        self.max_age
    }

    pub fn recursive(&self) -> bool {
        self.recursive
    }

    /// Extension filter without the leading dot, if any.
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// Whether `path` passes the extension filter (case-insensitive).
    pub fn matches(&self, path: &Path) -> bool {
        match &self.extension {
            None => true,
            Some(ext) => path
                .extension()
                .and_then(OsStr::to_str)
                .is_some_and(|e| e.eq_ignore_ascii_case(ext)),
        }
    }

    /// Oldest modification time that survives a sweep at `now`. Clamped to
    /// the earliest representable instant for very long retention.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Strictly older than `max_age` at `now`.
    pub fn is_expired(&self, file: &StoredFile, now: DateTime<Utc>) -> bool {
        now - file.modified > self.max_age
    }
}

// ---------------------------------------------------------------------------
// Sweeper
// ---------------------------------------------------------------------------

/// Deletes stored files older than the retention threshold.
///
/// Cheap to clone; clones share the store, the clock and the sweep lock, so
/// a scheduled sweep and a manual one never overlap.
#[derive(Clone)]
pub struct Sweeper {
    schedule: SweepSchedule,
    policy: RetentionPolicy,
    store: Arc<dyn FileStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) tick_interval: Duration,
    sweep_lock: Arc<Mutex<()>>,
}

impl fmt::Debug for Sweeper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sweeper")
            .field("schedule", &self.schedule)
            .field("policy", &self.policy)
            .field("tick_interval", &self.tick_interval)
            .finish_non_exhaustive()
    }
}

impl Sweeper {
    /// Bind a sweeper to `storage_root` with retention threshold `max_age`.
    ///
    /// Fails with [`SweepError::Configuration`] if the root is missing or not
    /// a directory, or if `max_age` is zero or negative. The scan is flat and
    /// unfiltered until [`recursive`](Self::recursive) or
    /// [`with_extension`](Self::with_extension) say otherwise.
    pub fn configure(
        schedule: SweepSchedule,
        storage_root: impl AsRef<Path>,
        max_age: TimeDelta,
    ) -> Result<Self, SweepError> {
        if max_age <= TimeDelta::zero() {
            return Err(SweepError::Configuration(format!(
                "Retention max age must be positive, got {max_age}"
            )));
        }

        let root = storage_root.as_ref();
        let meta = fs::metadata(root).map_err(|e| {
            SweepError::Configuration(format!(
                "Storage path {} is not accessible: {e}",
                root.display()
            ))
        })?;
        if !meta.is_dir() {
            return Err(SweepError::Configuration(format!(
                "Storage path {} is not a directory",
                root.display()
            )));
        }
        let storage_root = fs::canonicalize(root).map_err(|e| {
            SweepError::Configuration(format!(
                "Storage path {} cannot be resolved: {e}",
                root.display()
            ))
        })?;

        Ok(Self {
            schedule,
            policy: RetentionPolicy {
                storage_root,
                max_age,
                recursive: false,
                extension: None,
            },
            store: Arc::new(LocalFileStore),
            clock: Arc::new(SystemClock),
            tick_interval: DEFAULT_TICK_INTERVAL,
            sweep_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Descend into subdirectories of the storage root.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.policy.recursive = recursive;
        self
    }

    /// Only consider files with this extension. A leading dot is ignored and
    /// an empty string removes the filter.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        let extension = extension.trim().trim_start_matches('.');
        self.policy.extension = (!extension.is_empty()).then(|| extension.to_string());
        self
    }

    pub fn with_store(mut self, store: Arc<dyn FileStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Upper bound on a single sleep of the schedule loop.
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval.max(Duration::from_millis(1));
        self
    }

    pub fn schedule(&self) -> &SweepSchedule {
        &self.schedule
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Run one sweep, waiting for any sweep already in progress.
    ///
    /// Per-file failures are counted in the result and never abort the pass.
    pub fn run_once(&self) -> SweepResult {
        let _guard = self
            .sweep_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.sweep()
    }

    /// Run one sweep unless another is in progress, in which case `None`.
    pub fn try_run_once(&self) -> Option<SweepResult> {
        match self.sweep_lock.try_lock() {
            Ok(_guard) => Some(self.sweep()),
            Err(TryLockError::Poisoned(poisoned)) => {
                let _guard = poisoned.into_inner();
                Some(self.sweep())
            }
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Files a sweep would delete at the current time.
    ///
    /// Fails with [`SweepError::FileAccess`] if the storage root cannot be read.
    pub fn preview(&self) -> Result<RetentionPreview, SweepError> {
        let now = self.clock.now();
        let candidates: Vec<StoredFile> = self
            .matching_files()?
            .into_iter()
            .filter(|f| self.policy.is_expired(f, now))
            .collect();

        Ok(RetentionPreview {
            evaluated_at: now,
            cutoff: self.policy.cutoff(now),
            total_files: candidates.len(),
            total_bytes: candidates.iter().map(|f| f.size_bytes).sum(),
            candidates,
        })
    }

    /// Totals for the files the policy covers.
    ///
    /// Fails with [`SweepError::FileAccess`] if the storage root cannot be read.
    pub fn storage_stats(&self) -> Result<StorageStats, SweepError> {
        Ok(StorageStats::from_files(&self.matching_files()?))
    }

    fn matching_files(&self) -> Result<Vec<StoredFile>, SweepError> {
        let listing = self
            .store
            .scan(&self.policy.storage_root, self.policy.recursive)?;
        for e in &listing.errors {
            tracing::debug!(error = %e, "Storage scan: unreadable entry");
        }
        Ok(listing
            .files
            .into_iter()
            .filter(|f| self.policy.matches(&f.path))
            .collect())
    }

    fn sweep(&self) -> SweepResult {
        let started_at = self.clock.now();
        let mut result = SweepResult::begin(started_at);

        let listing = match self
            .store
            .scan(&self.policy.storage_root, self.policy.recursive)
        {
            Ok(listing) => listing,
            Err(e) => {
                tracing::error!(error = %e, "Retention sweep: storage root unreadable");
                result.record_error(e.to_string());
                result.finished_at = self.clock.now();
                return result;
            }
        };

        for e in listing.errors {
            tracing::warn!(error = %e, "Retention sweep: scan error");
            result.record_error(e.to_string());
        }

        for file in listing.files {
            if !self.policy.matches(&file.path) {
                continue;
            }
            result.files_scanned += 1;

            if !self.policy.is_expired(&file, started_at) {
                continue;
            }

            match self.remove_if_unchanged(&file) {
                Ok(true) => {
                    result.files_deleted += 1;
                    result.bytes_freed += file.size_bytes;
                    tracing::debug!(
                        path = %file.path.display(),
                        size_bytes = file.size_bytes,
                        "Deleted expired file"
                    );
                }
                Ok(false) => {
                    result.files_skipped += 1;
                    tracing::debug!(
                        path = %file.path.display(),
                        "File changed since scan, skipping"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Retention sweep: delete failed");
                    result.record_error(e.to_string());
                }
            }
        }

        result.finished_at = self.clock.now();

        if result.has_errors() {
            tracing::warn!(
                files_scanned = result.files_scanned,
                files_deleted = result.files_deleted,
                error_count = result.error_count,
                space_freed = %result.bytes_freed_human(),
                "Retention sweep completed with errors"
            );
        } else {
            tracing::info!(
                files_scanned = result.files_scanned,
                files_deleted = result.files_deleted,
                space_freed = %result.bytes_freed_human(),
                "Retention sweep completed"
            );
        }

        result
    }

    /// Delete `file` only if it still looks the way the scan saw it.
    fn remove_if_unchanged(&self, file: &StoredFile) -> Result<bool, SweepError> {
        let current = self.store.stat(&file.path)?;
        if current.modified != file.modified || current.size_bytes != file.size_bytes {
            return Ok(false);
        }
        self.store.remove(&file.path)?;
        Ok(true)
    }
}
