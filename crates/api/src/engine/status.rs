//! Job status lookup.
//!
//! The job store is authoritative when it holds a record. Without one (the
//! record was purged, or the process restarted) an artifact on disk means
//! `done`; anything else reports `pending`.

use pagesmith_core::job::{validate_job_id, ArtifactRef, JobStatus};
use pagesmith_store::{ArtifactError, ArtifactStore, JobStore};
use serde::Serialize;

/// Wire view of a job as returned by `GET /check-job/{jobId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatusView {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobStatusView {
    fn pending() -> Self {
        Self {
            status: JobStatus::Pending,
            image_url: None,
            error: None,
        }
    }

    fn done(url: String) -> Self {
        Self {
            status: JobStatus::Done,
            image_url: Some(url),
            error: None,
        }
    }
}

/// Resolve the current status of `job_id`.
///
/// `base_url` is the scheme and host used to build `image_url`.
pub async fn check_job(
    jobs: &JobStore,
    artifacts: &dyn ArtifactStore,
    job_id: &str,
    base_url: &str,
) -> Result<JobStatusView, ArtifactError> {
    // Ids that could never have been submitted are simply unknown.
    if validate_job_id(job_id).is_err() {
        return Ok(JobStatusView::pending());
    }

    let Some(job) = jobs.get(job_id).await else {
        return Ok(match artifacts.find(job_id).await? {
            Some(artifact) => JobStatusView::done(artifacts.url_for(&artifact, base_url)),
            None => JobStatusView::pending(),
        });
    };

    let view = match job.status {
        JobStatus::Pending => JobStatusView::pending(),
        JobStatus::Failed => JobStatusView {
            status: JobStatus::Failed,
            image_url: None,
            error: job.error,
        },
        JobStatus::Done => {
            let artifact: Option<ArtifactRef> = match job.artifact {
                Some(artifact) => Some(artifact),
                None => artifacts.find(job_id).await?,
            };
            match artifact {
                Some(artifact) => JobStatusView::done(artifacts.url_for(&artifact, base_url)),
                None => {
                    tracing::warn!(job_id, "Job marked done but no artifact is stored");
                    JobStatusView::pending()
                }
            }
        }
    };

    Ok(view)
}

#[cfg(test)]
mod tests {
    use pagesmith_core::job::ArtifactFormat;
    use pagesmith_store::{JobOutcome, LocalArtifactStore};

    use super::*;

    const BASE: &str = "http://localhost:3000";

    async fn stores() -> (tempfile::TempDir, JobStore, LocalArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = LocalArtifactStore::open(dir.path()).await.unwrap();
        (dir, JobStore::new(), artifacts)
    }

    #[tokio::test]
    async fn unknown_id_without_artifact_is_pending() {
        let (_dir, jobs, artifacts) = stores().await;
        let view = check_job(&jobs, &artifacts, "nope", BASE).await.unwrap();
        assert_eq!(view, JobStatusView::pending());
    }

    #[tokio::test]
    async fn malformed_id_is_pending_without_probing() {
        let (_dir, jobs, artifacts) = stores().await;
        let view = check_job(&jobs, &artifacts, "..", BASE).await.unwrap();
        assert_eq!(view.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn artifact_without_record_is_done() {
        let (_dir, jobs, artifacts) = stores().await;
        artifacts.write("old", ArtifactFormat::Png, b"img").await.unwrap();

        let view = check_job(&jobs, &artifacts, "old", BASE).await.unwrap();
        assert_eq!(view.status, JobStatus::Done);
        assert_eq!(
            view.image_url.as_deref(),
            Some("http://localhost:3000/generated/old.png")
        );
    }

    #[tokio::test]
    async fn pending_record_wins_over_stale_artifact() {
        let (_dir, jobs, artifacts) = stores().await;
        artifacts.write("p1", ArtifactFormat::Jpeg, b"old").await.unwrap();
        jobs.begin("p1").await;

        let view = check_job(&jobs, &artifacts, "p1", BASE).await.unwrap();
        assert_eq!(view.status, JobStatus::Pending);
        assert!(view.image_url.is_none());
    }

    #[tokio::test]
    async fn failed_record_reports_error() {
        let (_dir, jobs, artifacts) = stores().await;
        let job = jobs.begin("p1").await;
        jobs.finish(
            "p1",
            job.attempt,
            JobOutcome::Failed {
                reason: "No image generated".into(),
            },
        )
        .await;

        let view = check_job(&jobs, &artifacts, "p1", BASE).await.unwrap();
        assert_eq!(view.status, JobStatus::Failed);
        assert_eq!(view.error.as_deref(), Some("No image generated"));
        assert!(view.image_url.is_none());
    }

    #[tokio::test]
    async fn done_record_uses_its_artifact() {
        let (_dir, jobs, artifacts) = stores().await;
        let job = jobs.begin("p1").await;
        let art = artifacts.write("p1", ArtifactFormat::Jpeg, b"img").await.unwrap();
        jobs.finish("p1", job.attempt, JobOutcome::Done(art)).await;

        let view = check_job(&jobs, &artifacts, "p1", "https://cdn.example.com/")
            .await
            .unwrap();
        assert_eq!(
            view.image_url.as_deref(),
            Some("https://cdn.example.com/generated/p1.jpg")
        );
    }

    #[test]
    fn view_omits_absent_fields() {
        let json = serde_json::to_value(JobStatusView::pending()).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "pending" }));
    }
}
