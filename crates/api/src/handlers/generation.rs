//! Handlers for image generation jobs and their artifacts.
//!
//! Submission is fire-and-forget: `POST /generate-gpt-image` returns as soon
//! as the job is recorded, and clients poll `GET /check-job/{jobId}` until
//! the job reaches `done` or `failed`.

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, HOST};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pagesmith_core::job::{ArtifactRef, GenerationRequest};
use pagesmith_store::ArtifactError;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::engine::orchestrator::Acknowledgement;
use crate::engine::status::{check_job as resolve_status, JobStatusView};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Header set by reverse proxies carrying the client-facing scheme.
const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Request body for `POST /generate-gpt-image`.
///
/// Every field is optional at the wire level so that missing values surface
/// as a 400 from validation rather than a deserialization rejection.
/// `jobId` may be a string or a number; `transparent_background` accepts any
/// JSON value and is read by truthiness.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GenerateImageRequest {
    #[serde(rename = "jobId", deserialize_with = "string_or_number")]
    pub job_id: Option<String>,
    pub prompt: Option<String>,
    pub reference_image_url: Option<String>,
    #[serde(deserialize_with = "truthy")]
    pub transparent_background: bool,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(D::Error::custom(format!(
            "jobId must be a string or a number, got {other}"
        ))),
    }
}

/// `false`, `null`, `0`, `NaN` and `""` are false; everything else is true.
fn truthy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

impl GenerateImageRequest {
    fn into_parts(self) -> (String, GenerationRequest) {
        let reference_image_url = self
            .reference_image_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        (
            self.job_id.unwrap_or_default(),
            GenerationRequest {
                prompt: self.prompt.unwrap_or_default(),
                reference_image_url,
                transparent_background: self.transparent_background,
            },
        )
    }
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /generate-gpt-image
///
/// Start a generation. Returns `{"status": "started", "jobId"}` before the
/// remote call begins; 400 if the body is not a JSON object or `jobId` or
/// `prompt` is missing, 503 when the generation queue is full.
pub async fn generate_image(
    State(state): State<AppState>,
    payload: Result<Json<GenerateImageRequest>, JsonRejection>,
) -> AppResult<Json<Acknowledgement>> {
    let Json(input) = payload?;
    let (job_id, request) = input.into_parts();
    let ack = state.orchestrator.submit(job_id, request).await?;
    Ok(Json(ack))
}

// ---------------------------------------------------------------------------
// Poll
// ---------------------------------------------------------------------------

/// GET /check-job/{jobId}
///
/// Unknown ids report `pending`; clients are expected to poll with their
/// own timeout.
pub async fn check_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    headers: HeaderMap,
) -> AppResult<Json<JobStatusView>> {
    let base_url = public_base_url(&state, &headers);
    let view = resolve_status(&state.jobs, state.artifacts.as_ref(), &job_id, &base_url).await?;
    Ok(Json(view))
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

/// GET /generated/{file}
///
/// Serve a stored artifact with its image content type.
pub async fn serve_artifact(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> AppResult<Response> {
    let artifact = ArtifactRef::from_file_name(&file)
        .ok_or_else(|| AppError::Artifact(ArtifactError::NotFound(file.clone())))?;

    let bytes = state.artifacts.read(&artifact).await?;

    Ok((
        [
            (CONTENT_TYPE, artifact.format.content_type()),
            (CACHE_CONTROL, "no-cache"),
        ],
        Body::from(bytes),
    )
        .into_response())
}

/// Scheme and host under which artifacts are reachable by the caller.
///
/// `PUBLIC_BASE_URL` wins when configured; otherwise the request's `Host`
/// header is used with the scheme from `X-Forwarded-Proto` (default `http`).
fn public_base_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(base) = &state.config.public_base_url {
        return base.clone();
    }

    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}:{}", state.config.host, state.config.port));

    let scheme = headers
        .get(FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("http");

    format!("{scheme}://{host}")
}
