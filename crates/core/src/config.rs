//! Cleanup configuration loaded from environment variables.
//!
//! | Env Var                       | Default      |
//! |-------------------------------|--------------|
//! | `GPX_CLEANUP_ENABLED`         | `true`       |
//! | `GPX_CLEANUP_SCHEDULE_HOUR`   | `3`          |
//! | `GPX_CLEANUP_SCHEDULE_MINUTE` | `0`          |
//! | `GPX_STORAGE_PATH`            | `./data/gpx` |
//! | `GPX_CLEANUP_MAX_AGE_HOURS`   | required     |
//! | `GPX_CLEANUP_RECURSIVE`       | `false`      |
//! | `GPX_CLEANUP_EXTENSION`       | `gpx`        |

use std::path::PathBuf;
use std::str::FromStr;

use chrono::TimeDelta;

use crate::error::SweepError;
use crate::schedule::{SweepSchedule, DEFAULT_SCHEDULE_HOUR, DEFAULT_SCHEDULE_MINUTE};
use crate::sweeper::Sweeper;

pub const ENV_ENABLED: &str = "GPX_CLEANUP_ENABLED";
pub const ENV_SCHEDULE_HOUR: &str = "GPX_CLEANUP_SCHEDULE_HOUR";
pub const ENV_SCHEDULE_MINUTE: &str = "GPX_CLEANUP_SCHEDULE_MINUTE";
pub const ENV_STORAGE_PATH: &str = "GPX_STORAGE_PATH";
pub const ENV_MAX_AGE_HOURS: &str = "GPX_CLEANUP_MAX_AGE_HOURS";
pub const ENV_RECURSIVE: &str = "GPX_CLEANUP_RECURSIVE";
pub const ENV_EXTENSION: &str = "GPX_CLEANUP_EXTENSION";

/// Storage directory when `GPX_STORAGE_PATH` is unset.
pub const DEFAULT_STORAGE_PATH: &str = "./data/gpx";

/// Extension filter when `GPX_CLEANUP_EXTENSION` is unset.
pub const DEFAULT_EXTENSION: &str = "gpx";

/// Retention sweeper settings.
///
/// Parsing only checks syntax and ranges. Whether the storage path exists is
/// checked by [`CleanupConfig::build_sweeper`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupConfig {
    pub schedule: SweepSchedule,
    pub storage_path: PathBuf,
    /// Retention threshold. Has no default.
    pub max_age: Option<TimeDelta>,
    pub recursive: bool,
    /// Empty means every file is considered.
    pub extension: String,
}

impl CleanupConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, SweepError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SweepError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string());

        let enabled = parse_bool_or(ENV_ENABLED, var(ENV_ENABLED), true)?;
        let hour = parse_or(ENV_SCHEDULE_HOUR, var(ENV_SCHEDULE_HOUR), DEFAULT_SCHEDULE_HOUR)?;
        let minute = parse_or(
            ENV_SCHEDULE_MINUTE,
            var(ENV_SCHEDULE_MINUTE),
            DEFAULT_SCHEDULE_MINUTE,
        )?;
        let schedule = SweepSchedule::new(enabled, hour, minute)?;

        let storage_path = var(ENV_STORAGE_PATH)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_STORAGE_PATH.to_string())
            .into();

        let max_age = match var(ENV_MAX_AGE_HOURS) {
            Some(v) => {
                let hours: i64 = parse(ENV_MAX_AGE_HOURS, &v)?;
                if hours <= 0 {
                    return Err(SweepError::Configuration(format!(
                        "{ENV_MAX_AGE_HOURS} must be a positive number of hours, got {hours}"
                    )));
                }
                let age = TimeDelta::try_hours(hours).ok_or_else(|| {
                    SweepError::Configuration(format!("{ENV_MAX_AGE_HOURS} is too large: {hours}"))
                })?;
                Some(age)
            }
            None => None,
        };

        let recursive = parse_bool_or(ENV_RECURSIVE, var(ENV_RECURSIVE), false)?;

        let extension = var(ENV_EXTENSION).unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

        Ok(Self {
            schedule,
            storage_path,
            max_age,
            recursive,
            extension,
        })
    }

    /// Like [`build_sweeper`](Self::build_sweeper), but a disabled schedule
    /// without a retention threshold is `Ok(None)` rather than an error.
    ///
    /// A disabled schedule with a threshold still yields a sweeper, so
    /// manual runs keep working.
    pub fn build_sweeper_if_enabled(&self) -> Result<Option<Sweeper>, SweepError> {
        if !self.schedule.enabled() && self.max_age.is_none() {
            return Ok(None);
        }
        self.build_sweeper().map(Some)
    }

    /// Construct the sweeper this configuration describes.
    ///
    /// Fails if the retention threshold is missing or the storage path is not
    /// an existing directory.
    pub fn build_sweeper(&self) -> Result<Sweeper, SweepError> {
        let max_age = self.max_age.ok_or_else(|| {
            SweepError::Configuration(format!(
                "{ENV_MAX_AGE_HOURS} must be set to enable retention"
            ))
        })?;

        Ok(Sweeper::configure(self.schedule, &self.storage_path, max_age)?
            .recursive(self.recursive)
            .with_extension(self.extension.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn parse<T>(key: &str, value: &str) -> Result<T, SweepError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| SweepError::Configuration(format!("{key}='{value}' is invalid: {e}")))
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T, SweepError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(v) if !v.is_empty() => parse(key, &v),
        _ => Ok(default),
    }
}

fn parse_bool_or(key: &str, value: Option<String>, default: bool) -> Result<bool, SweepError> {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(SweepError::Configuration(format!(
            "{key}='{value}' is not a boolean"
        ))),
    }
}
