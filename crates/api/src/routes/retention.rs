use axum::routing::{get, post};
use axum::Router;

use crate::handlers::retention;
use crate::state::AppState;

/// Retention routes, mounted at `/api/v1/retention`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(retention::get_status))
        .route("/stats", get(retention::get_stats))
        .route("/preview", get(retention::get_preview))
        .route("/run", post(retention::run_sweep))
}
