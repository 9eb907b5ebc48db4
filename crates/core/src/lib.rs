//! `noshoes-core` -- GPX track retention.
//!
//! Deletes stored activity-track files older than a retention threshold,
//! once per day at a configured local time. No HTTP or process concerns live
//! here; the `noshoes-api` binary hosts the sweeper.

pub mod clock;
pub mod config;
pub mod error;
pub mod format;
pub mod handle;
pub mod report;
pub mod schedule;
pub mod scheduler;
pub mod store;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CleanupConfig;
pub use error::SweepError;
pub use handle::{SweepHandle, SweeperStatus};
pub use report::{RetentionPreview, StorageStats, SweepResult};
pub use schedule::SweepSchedule;
pub use scheduler::{Scheduler, SchedulerState, Tick};
pub use store::{FileStore, LocalFileStore, ScanOutcome, StoredFile};
pub use sweeper::{RetentionPolicy, Sweeper};
