//! Persistence of generated images, keyed by job id.
//!
//! The [`ArtifactStore`] trait keeps the backend swappable; the
//! orchestrator and HTTP handlers only see `Arc<dyn ArtifactStore>`.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pagesmith_core::job::{ArtifactFormat, ArtifactRef};

/// Errors from artifact persistence.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// Writing the artifact failed.
    #[error("Failed to write artifact {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading or probing the artifact failed for a reason other than absence.
    #[error("Failed to read artifact {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No artifact with this file name exists.
    #[error("Artifact not found: {0}")]
    NotFound(String),
}

/// Storage for completed artifacts.
///
/// Keys are job ids; a second write for the same id replaces the first
/// (no versioning). No expiry is applied.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist `bytes` as the artifact of `job_id`, replacing any previous
    /// artifact of that id regardless of format.
    async fn write(
        &self,
        job_id: &str,
        format: ArtifactFormat,
        bytes: &[u8],
    ) -> Result<ArtifactRef, ArtifactError>;

    /// Locate the artifact of `job_id`, if one exists.
    async fn find(&self, job_id: &str) -> Result<Option<ArtifactRef>, ArtifactError>;

    /// Read the bytes of an artifact.
    async fn read(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, ArtifactError>;

    async fn exists(&self, job_id: &str) -> Result<bool, ArtifactError> {
        Ok(self.find(job_id).await?.is_some())
    }

    /// Public URL of an artifact under `base_url` (scheme + host).
    fn url_for(&self, artifact: &ArtifactRef, base_url: &str) -> String {
        format!(
            "{}/generated/{}",
            base_url.trim_end_matches('/'),
            artifact.file_name()
        )
    }
}

/// Flat-directory artifact store: one `<job_id>.<ext>` file per job.
pub struct LocalArtifactStore {
    dir: PathBuf,
}

impl LocalArtifactStore {
    /// Open (and create if needed) the artifact directory.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, ArtifactError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| ArtifactError::Write {
                path: dir.clone(),
                source,
            })?;

        tracing::info!(dir = %dir.display(), "Artifact directory ready");
        Ok(Self { dir })
    }

    /// Directory holding the artifacts.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, artifact: &ArtifactRef) -> PathBuf {
        self.dir.join(artifact.file_name())
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn write(
        &self,
        job_id: &str,
        format: ArtifactFormat,
        bytes: &[u8],
    ) -> Result<ArtifactRef, ArtifactError> {
        let artifact = ArtifactRef::new(job_id, format);
        let path = self.path_of(&artifact);

        // Write to a sibling temp file and rename so pollers never see a
        // partially written image.
        let tmp = self.dir.join(format!(".{}.tmp", artifact.file_name()));
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|source| ArtifactError::Write {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| ArtifactError::Write {
                path: path.clone(),
                source,
            })?;

        for other in ArtifactFormat::ALL.into_iter().filter(|f| *f != format) {
            let stale = self.path_of(&ArtifactRef::new(job_id, other));
            match tokio::fs::remove_file(&stale).await {
                Ok(()) => {
                    tracing::debug!(job_id, path = %stale.display(), "Removed superseded artifact")
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => return Err(ArtifactError::Write { path: stale, source }),
            }
        }

        tracing::debug!(job_id, path = %path.display(), bytes = bytes.len(), "Artifact written");
        Ok(artifact)
    }

    async fn find(&self, job_id: &str) -> Result<Option<ArtifactRef>, ArtifactError> {
        for format in ArtifactFormat::ALL {
            let artifact = ArtifactRef::new(job_id, format);
            let path = self.path_of(&artifact);
            let exists = tokio::fs::try_exists(&path)
                .await
                .map_err(|source| ArtifactError::Read { path, source })?;
            if exists {
                return Ok(Some(artifact));
            }
        }
        Ok(None)
    }

    async fn read(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, ArtifactError> {
        let path = self.path_of(artifact);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(ArtifactError::NotFound(artifact.file_name()))
            }
            Err(source) => Err(ArtifactError::Read { path, source }),
        }
    }
}
