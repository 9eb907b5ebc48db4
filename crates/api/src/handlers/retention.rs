//! Handlers for the retention endpoints.
//!
//! Filesystem work (scan, sweep) runs on the blocking pool. A manual run
//! shares the sweeper's lock with the daily schedule, so it is refused with
//! `409` while any sweep is in progress.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use noshoes_core::{StorageStats, SweepResult};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Storage totals alongside the policy they were computed under.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub storage_path: String,
    pub max_age_hours: i64,
    pub recursive: bool,
    pub extension: Option<String>,
    #[serde(flatten)]
    pub stats: StorageStats,
}

/// Outcome of a manual sweep.
#[derive(Debug, Serialize)]
pub struct RunResponse {
    #[serde(flatten)]
    pub result: SweepResult,
    pub bytes_freed_human: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/retention/status
pub async fn get_status(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let retention = state.retention()?;
    Ok(Json(DataResponse {
        data: retention.status(),
    }))
}

/// GET /api/v1/retention/stats
pub async fn get_stats(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let sweeper = state.retention()?.sweeper.clone();
    let policy = sweeper.policy().clone();

    let stats = blocking(move || sweeper.storage_stats()).await??;

    Ok(Json(DataResponse {
        data: StatsResponse {
            storage_path: policy.storage_root().display().to_string(),
            max_age_hours: policy.max_age().num_hours(),
            recursive: policy.recursive(),
            extension: policy.extension().map(str::to_string),
            stats,
        },
    }))
}

/// GET /api/v1/retention/preview
pub async fn get_preview(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let sweeper = state.retention()?.sweeper.clone();
    let preview = blocking(move || sweeper.preview()).await??;
    Ok(Json(DataResponse { data: preview }))
}

/// POST /api/v1/retention/run
pub async fn run_sweep(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let sweeper = state.retention()?.sweeper.clone();

    tracing::info!("Manual retention sweep requested");
    let result = blocking(move || sweeper.try_run_once())
        .await?
        .ok_or_else(|| AppError::Conflict("A retention sweep is already running".into()))?;

    Ok(Json(DataResponse {
        data: RunResponse {
            bytes_freed_human: result.bytes_freed_human(),
            result,
        },
    }))
}

async fn blocking<T, F>(job: F) -> AppResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| AppError::InternalError(format!("Retention task failed: {e}")))
}
