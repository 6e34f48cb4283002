use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pagesmith_core::error::CoreError;
use pagesmith_store::ArtifactError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `pagesmith_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An artifact storage error.
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Malformed or non-JSON request bodies keep the JSON error shape.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Overloaded(msg) => {
                    tracing::warn!(reason = %msg, "Rejecting request, generation queue full");
                    (StatusCode::SERVICE_UNAVAILABLE, "OVERLOADED", msg.clone())
                }
            },

            // --- Artifact storage ---
            AppError::Artifact(ArtifactError::NotFound(name)) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Artifact {name} not found"),
            ),
            AppError::Artifact(err) => {
                tracing::error!(error = %err, "Artifact storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
