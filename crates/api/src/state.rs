use std::sync::Arc;

use noshoes_core::{SweepHandle, Sweeper, SweeperStatus};
use tokio::sync::watch;

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything inside is behind an `Arc` or a watch receiver.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// `None` when the cleanup configuration was missing or invalid.
    pub retention: Option<RetentionState>,
}

/// The sweeper plus a live view of its schedule.
#[derive(Clone)]
pub struct RetentionState {
    pub sweeper: Sweeper,
    pub status: watch::Receiver<SweeperStatus>,
}

impl RetentionState {
    /// Pair a sweeper with the handle returned by starting it.
    pub fn new(sweeper: Sweeper, handle: &SweepHandle) -> Self {
        Self {
            sweeper,
            status: handle.subscribe(),
        }
    }

    pub fn status(&self) -> SweeperStatus {
        self.status.borrow().clone()
    }
}

impl AppState {
    /// The retention state, or [`AppError::Unavailable`] if there is none.
    pub fn retention(&self) -> AppResult<&RetentionState> {
        self.retention.as_ref().ok_or_else(|| {
            AppError::Unavailable("GPX retention sweeper is not configured".into())
        })
    }
}
