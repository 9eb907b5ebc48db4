use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use noshoes_core::SweepError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`SweepError`] for retention errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// An error from `noshoes_core`.
    #[error(transparent)]
    Core(#[from] SweepError),

    /// The retention sweeper is not configured in this process.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The request clashes with work already in progress.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                SweepError::Configuration(msg) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "CONFIGURATION_ERROR",
                    msg.clone(),
                ),
                SweepError::FileAccess { .. } => {
                    tracing::error!(error = %core, "Storage not accessible");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "STORAGE_UNAVAILABLE",
                        "GPX storage is not accessible".to_string(),
                    )
                }
                SweepError::Scheduling(_) => {
                    tracing::error!(error = %core, "Retention error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            AppError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", msg.clone())
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
