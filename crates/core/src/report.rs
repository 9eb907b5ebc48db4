//! Outcome types produced by the sweeper.
//!
//! None of these are persisted. They exist for logging and for the host's
//! HTTP surface.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::format::{bytes_to_mb, format_bytes};
use crate::store::StoredFile;

/// Error messages kept per sweep. The count is always exact.
pub const MAX_RECORDED_ERRORS: usize = 100;

/// Summary of one sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepResult {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Files that matched the policy filter.
    pub files_scanned: usize,
    pub files_deleted: usize,
    /// Expired files left alone because they changed after the scan.
    pub files_skipped: usize,
    pub bytes_freed: u64,
    pub error_count: usize,
    /// First [`MAX_RECORDED_ERRORS`] error messages.
    pub errors: Vec<String>,
}

impl SweepResult {
    pub(crate) fn begin(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            files_scanned: 0,
            files_deleted: 0,
            files_skipped: 0,
            bytes_freed: 0,
            error_count: 0,
            errors: Vec::new(),
        }
    }

    pub(crate) fn record_error(&mut self, message: String) {
        self.error_count += 1;
        if self.errors.len() < MAX_RECORDED_ERRORS {
            self.errors.push(message);
        }
    }

    pub fn bytes_freed_human(&self) -> String {
        format_bytes(self.bytes_freed)
    }

    pub fn duration(&self) -> TimeDelta {
        self.finished_at - self.started_at
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }
}

/// Totals for the files currently held in storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageStats {
    pub total_files: usize,
    pub total_size_bytes: u64,
    pub total_size_mb: f64,
}

impl StorageStats {
    pub(crate) fn from_files(files: &[StoredFile]) -> Self {
        let total_size_bytes = files.iter().map(|f| f.size_bytes).sum();
        Self {
            total_files: files.len(),
            total_size_bytes,
            total_size_mb: bytes_to_mb(total_size_bytes),
        }
    }
}

/// What a sweep would delete right now, without deleting anything.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetentionPreview {
    pub evaluated_at: DateTime<Utc>,
    pub cutoff: DateTime<Utc>,
    pub total_files: usize,
    pub total_bytes: u64,
    pub candidates: Vec<StoredFile>,
}
