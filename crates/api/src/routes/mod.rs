pub mod health;
pub mod retention;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /retention/status        schedule state, next run, last result (GET)
/// /retention/stats         totals for stored track files (GET)
/// /retention/preview       files a sweep would delete now (GET)
/// /retention/run           run a sweep immediately (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/retention", retention::router())
}
