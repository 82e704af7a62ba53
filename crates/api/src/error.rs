use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use deadman_core::CoreError;

/// Application-level error type for HTTP handlers.
///
/// The only fallible handler step is decoding the webhook body, so every
/// error here is the caller's fault and maps to `400`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `deadman_core`.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let AppError::Core(core) = &self;
        tracing::debug!(error = %core, "Rejecting request");

        let body = json!({
            "error": core.to_string(),
            "code": "BAD_REQUEST",
        });

        (StatusCode::BAD_REQUEST, axum::Json(body)).into_response()
    }
}
