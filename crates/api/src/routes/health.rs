use axum::extract::State;
use axum::{routing::get, Json, Router};
use noshoes_core::SweeperStatus;
use serde::Serialize;

use crate::state::AppState;

/// Application name reported by `/health`.
pub const APP_NAME: &str = "Strava NoShoes";

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the process serves requests.
    pub status: &'static str,
    pub app: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Sweeper status, `null` when retention is not configured.
    pub sweeper: Option<SweeperStatus>,
}

/// GET /health -- liveness plus a snapshot of the sweeper.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        app: APP_NAME,
        version: env!("CARGO_PKG_VERSION"),
        sweeper: state.retention.as_ref().map(|r| r.status()),
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
