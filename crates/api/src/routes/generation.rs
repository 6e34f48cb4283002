//! Route definitions for image generation.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::generation;
use crate::state::AppState;

/// Generation routes, mounted at the root.
///
/// ```text
/// POST   /generate-gpt-image      -> generate_image
/// GET    /check-job/{jobId}       -> check_job
/// GET    /generated/{file}        -> serve_artifact
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate-gpt-image", post(generation::generate_image))
        .route("/check-job/{jobId}", get(generation::check_job))
        .route("/generated/{file}", get(generation::serve_artifact))
}
