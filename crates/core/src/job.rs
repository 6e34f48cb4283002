//! Image-generation job lifecycle types and submission validation.
//!
//! A [`Job`] moves `pending -> done` or `pending -> failed` exactly once.
//! Re-submitting an id replaces the record with a fresh `pending` one
//! carrying a new `attempt` number.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum length of a client-supplied job id.
pub const MAX_JOB_ID_LEN: usize = 128;

/// Maximum length of a generation prompt (characters).
pub const MAX_PROMPT_LEN: usize = 32_000;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle state of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Done,
    Failed,
}

impl JobStatus {
    /// Wire name (`pending`, `done`, `failed`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

/// Encoding of a generated image.
///
/// Transparent backgrounds need a lossless format, so they are always PNG;
/// opaque images are requested as JPEG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    Png,
    Jpeg,
}

impl ArtifactFormat {
    /// All formats, in lookup order.
    pub const ALL: [ArtifactFormat; 2] = [ArtifactFormat::Png, ArtifactFormat::Jpeg];

    /// File extension used on disk.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    /// `output_format` value understood by the remote generation API.
    pub fn api_name(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    /// Parse from a file extension (case-insensitive, `jpeg` accepted).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }
}

/// Reference to a persisted artifact: the owning job id and its format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub job_id: JobId,
    pub format: ArtifactFormat,
}

impl ArtifactRef {
    pub fn new(job_id: impl Into<JobId>, format: ArtifactFormat) -> Self {
        Self {
            job_id: job_id.into(),
            format,
        }
    }

    /// Flat file name, `<job_id>.<ext>`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.job_id, self.format.extension())
    }

    /// Inverse of [`file_name`](Self::file_name). Returns `None` for unknown
    /// extensions or names whose stem is not a valid job id.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (stem, ext) = name.rsplit_once('.')?;
        let format = ArtifactFormat::from_extension(ext)?;
        validate_job_id(stem).ok()?;
        Some(Self::new(stem, format))
    }
}

// ---------------------------------------------------------------------------
// Job record
// ---------------------------------------------------------------------------

/// A tracked generation job as held by the job store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    /// Present only when `status == Done`.
    pub artifact: Option<ArtifactRef>,
    /// Present only when `status == Failed`.
    pub error: Option<String>,
    /// Submission counter assigned by the store; identifies which
    /// submission of `id` this record belongs to.
    pub attempt: u64,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl Job {
    /// A freshly submitted job.
    pub fn pending(id: impl Into<JobId>, attempt: u64) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Pending,
            artifact: None,
            error: None,
            attempt,
            created_at: chrono::Utc::now(),
            completed_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Generation request
// ---------------------------------------------------------------------------

/// Inputs of one generation, consumed by a single orchestration cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub reference_image_url: Option<String>,
    pub transparent_background: bool,
}

impl GenerationRequest {
    /// Output encoding implied by the transparency flag.
    pub fn output_format(&self) -> ArtifactFormat {
        if self.transparent_background {
            ArtifactFormat::Png
        } else {
            ArtifactFormat::Jpeg
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a client-supplied job id.
///
/// Rules:
/// - Must not be empty or whitespace only.
/// - Must not exceed `MAX_JOB_ID_LEN` characters.
/// - Must be usable as a flat file name: no path separators, no `..`,
///   no control characters.
pub fn validate_job_id(job_id: &str) -> Result<(), CoreError> {
    if job_id.trim().is_empty() {
        return Err(CoreError::Validation("jobId and prompt required".into()));
    }
    if job_id.chars().count() > MAX_JOB_ID_LEN {
        return Err(CoreError::Validation(format!(
            "jobId must not exceed {MAX_JOB_ID_LEN} characters"
        )));
    }
    if job_id.contains(['/', '\\']) || job_id.contains("..") || job_id.chars().any(char::is_control)
    {
        return Err(CoreError::Validation(
            "jobId may not contain path separators, '..' or control characters".into(),
        ));
    }
    Ok(())
}

/// Validate a generation prompt: non-blank and within `MAX_PROMPT_LEN`.
pub fn validate_prompt(prompt: &str) -> Result<(), CoreError> {
    if prompt.trim().is_empty() {
        return Err(CoreError::Validation("jobId and prompt required".into()));
    }
    if prompt.chars().count() > MAX_PROMPT_LEN {
        return Err(CoreError::Validation(format!(
            "prompt must not exceed {MAX_PROMPT_LEN} characters"
        )));
    }
    Ok(())
}
