pub mod generation;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the full route tree.
///
/// ```text
/// /health                          service health + in-flight count
/// /generate-gpt-image              submit a generation (POST)
/// /check-job/{jobId}               poll job status
/// /generated/{file}                generated image bytes
/// ```
pub fn app_routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(generation::router())
}
