//! Fire-and-forget generation with polling (job orchestrator).
//!
//! [`JobOrchestrator::submit`] validates the request, records a `pending`
//! job, and returns the acknowledgement before any network I/O. The
//! generation itself runs as a tracked background task whose result is
//! written back through [`JobStore::finish`], the single update path.
//!
//! Two semaphores bound resource use:
//! - `admission` caps admitted-but-unfinished jobs; when exhausted,
//!   submissions are rejected with [`CoreError::Overloaded`].
//! - `concurrency` caps simultaneous calls to the generator; admitted jobs
//!   queue for a permit.

use std::sync::Arc;
use std::time::Duration;

use pagesmith_core::error::CoreError;
use pagesmith_core::job::{validate_job_id, validate_prompt, ArtifactRef, GenerationRequest};
use pagesmith_imagegen::{GenerationError, ImageGenerator};
use pagesmith_store::{ArtifactError, ArtifactStore, JobOutcome, JobStore};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio_util::task::TaskTracker;

/// Marker returned in every acknowledgement.
pub const STATUS_STARTED: &str = "started";

/// Immediate response to a submission: processing has begun, nothing more.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Acknowledgement {
    pub status: &'static str,
    #[serde(rename = "jobId")]
    pub job_id: String,
}

/// Why a background generation ended in `failed`.
#[derive(Debug, thiserror::Error)]
pub enum JobFailure {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    /// The generation task panicked or was aborted.
    #[error("Generation task aborted: {0}")]
    Aborted(String),
}

/// Resource limits for the orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorLimits {
    pub max_concurrent: usize,
    pub max_queued: usize,
}

/// Accepts generation requests and drives them in the background.
pub struct JobOrchestrator {
    jobs: Arc<JobStore>,
    artifacts: Arc<dyn ArtifactStore>,
    generator: Arc<dyn ImageGenerator>,
    concurrency: Arc<Semaphore>,
    admission: Arc<Semaphore>,
    limits: OrchestratorLimits,
    tracker: TaskTracker,
    /// Serializes artifact commits across tasks.
    commit: Arc<Mutex<()>>,
}

impl JobOrchestrator {
    pub fn new(
        jobs: Arc<JobStore>,
        artifacts: Arc<dyn ArtifactStore>,
        generator: Arc<dyn ImageGenerator>,
        limits: OrchestratorLimits,
    ) -> Self {
        Self {
            jobs,
            artifacts,
            generator,
            concurrency: Arc::new(Semaphore::new(limits.max_concurrent)),
            admission: Arc::new(Semaphore::new(limits.max_queued)),
            limits,
            tracker: TaskTracker::new(),
            commit: Arc::new(Mutex::new(())),
        }
    }

    /// Submit a generation for `job_id`.
    ///
    /// Fails synchronously (no job created) when `job_id` or the prompt is
    /// missing or invalid, or when the admission queue is full. Otherwise the
    /// job is `pending` when this returns and the generation has been
    /// spawned. Re-submitting an id replaces its previous record.
    pub async fn submit(
        &self,
        job_id: String,
        request: GenerationRequest,
    ) -> Result<Acknowledgement, CoreError> {
        validate_job_id(&job_id)?;
        validate_prompt(&request.prompt)?;

        let admission = Arc::clone(&self.admission)
            .try_acquire_owned()
            .map_err(|_| {
                CoreError::Overloaded(format!(
                    "{} generations already in progress, retry later",
                    self.limits.max_queued
                ))
            })?;

        let job = self.jobs.begin(&job_id).await;

        tracing::info!(
            job_id = %job_id,
            attempt = job.attempt,
            has_reference = request.reference_image_url.is_some(),
            transparent = request.transparent_background,
            "Generation job submitted",
        );

        let task = GenerationTask {
            job_id: job_id.clone(),
            attempt: job.attempt,
            request,
            jobs: Arc::clone(&self.jobs),
            artifacts: Arc::clone(&self.artifacts),
            generator: Arc::clone(&self.generator),
            concurrency: Arc::clone(&self.concurrency),
            commit: Arc::clone(&self.commit),
        };
        self.tracker.spawn(task.run(admission));

        Ok(Acknowledgement {
            status: STATUS_STARTED,
            job_id,
        })
    }

    /// Number of admitted generations that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.limits.max_queued - self.admission.available_permits()
    }

    /// Stop accepting work and wait up to `timeout` for in-flight
    /// generations. Returns `true` if all of them finished.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.admission.close();
        self.tracker.close();
        tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok()
    }
}

/// Everything one background generation needs, owned by its task.
struct GenerationTask {
    job_id: String,
    attempt: u64,
    request: GenerationRequest,
    jobs: Arc<JobStore>,
    artifacts: Arc<dyn ArtifactStore>,
    generator: Arc<dyn ImageGenerator>,
    concurrency: Arc<Semaphore>,
    commit: Arc<Mutex<()>>,
}

impl GenerationTask {
    /// Run to completion and record the outcome. Never returns an error:
    /// failures end up in the job store and the log.
    async fn run(self, _admission: OwnedSemaphorePermit) {
        // Run the generation in its own task so a panic still fails the job.
        let generation = tokio::spawn(generate(
            Arc::clone(&self.generator),
            Arc::clone(&self.concurrency),
            self.request.clone(),
        ));
        let generated = match generation.await {
            Ok(result) => result,
            Err(join_err) => Err(JobFailure::Aborted(join_err.to_string())),
        };

        // Attempt check, artifact write and finish happen under one lock: a
        // superseded attempt never replaces the artifact of a newer one.
        let _commit = self.commit.lock().await;
        if !self.jobs.is_current(&self.job_id, self.attempt).await {
            tracing::debug!(
                job_id = %self.job_id,
                attempt = self.attempt,
                "Outcome superseded by a newer submission, discarding",
            );
            return;
        }

        let outcome = match self.store(generated).await {
            Ok(artifact) => {
                tracing::info!(
                    job_id = %self.job_id,
                    attempt = self.attempt,
                    file = %artifact.file_name(),
                    "Generation job completed",
                );
                JobOutcome::Done(artifact)
            }
            Err(err) => {
                tracing::error!(
                    job_id = %self.job_id,
                    attempt = self.attempt,
                    error = %err,
                    "Generation job failed",
                );
                JobOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        };

        self.jobs.finish(&self.job_id, self.attempt, outcome).await;
    }

    async fn store(&self, generated: Result<Vec<u8>, JobFailure>) -> Result<ArtifactRef, JobFailure> {
        let bytes = generated?;
        let artifact = self
            .artifacts
            .write(&self.job_id, self.request.output_format(), &bytes)
            .await?;
        Ok(artifact)
    }
}

/// Call the generator once a concurrency permit is available.
async fn generate(
    generator: Arc<dyn ImageGenerator>,
    concurrency: Arc<Semaphore>,
    request: GenerationRequest,
) -> Result<Vec<u8>, JobFailure> {
    let _permit = concurrency
        .acquire()
        .await
        .map_err(|e| JobFailure::Aborted(e.to_string()))?;

    Ok(generator.generate(&request).await?)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use pagesmith_core::job::{ArtifactFormat, JobStatus};
    use pagesmith_store::LocalArtifactStore;
    use tokio::sync::Notify;

    use super::*;

    /// Generator that blocks until released, then returns fixed bytes.
    struct GatedGenerator {
        gate: Notify,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl GatedGenerator {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                gate: Notify::new(),
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ImageGenerator for GatedGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> Result<Vec<u8>, GenerationError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.gate.notified().await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(b"image".to_vec())
        }
    }

    /// Generator that is slow for the prompt "first" and echoes the prompt.
    struct SlowFirstGenerator;

    #[async_trait]
    impl ImageGenerator for SlowFirstGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>, GenerationError> {
            if request.prompt == "first" {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            Ok(format!("image:{}", request.prompt).into_bytes())
        }
    }

    struct PanickingGenerator;

    #[async_trait]
    impl ImageGenerator for PanickingGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> Result<Vec<u8>, GenerationError> {
            panic!("generator bug");
        }
    }

    fn request(prompt: &str) -> GenerationRequest {
        GenerationRequest {
            prompt: prompt.into(),
            reference_image_url: None,
            transparent_background: false,
        }
    }

    async fn orchestrator(
        generator: Arc<dyn ImageGenerator>,
        limits: OrchestratorLimits,
    ) -> (tempfile::TempDir, Arc<JobStore>, JobOrchestrator) {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = Arc::new(LocalArtifactStore::open(dir.path()).await.unwrap());
        let jobs = Arc::new(JobStore::new());
        let orch = JobOrchestrator::new(Arc::clone(&jobs), artifacts, generator, limits);
        (dir, jobs, orch)
    }

    async fn wait_for_status(jobs: &JobStore, job_id: &str, status: JobStatus) {
        for _ in 0..200 {
            if jobs.get(job_id).await.map(|j| j.status) == Some(status) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {job_id} never reached {status}");
    }

    const LIMITS: OrchestratorLimits = OrchestratorLimits {
        max_concurrent: 2,
        max_queued: 3,
    };

    #[tokio::test]
    async fn submit_rejects_blank_fields_without_creating_job() {
        let (_dir, jobs, orch) = orchestrator(GatedGenerator::new(), LIMITS).await;

        let err = orch.submit(String::new(), request("fox")).await.unwrap_err();
        assert_matches!(err, CoreError::Validation(_));

        let err = orch.submit("p1".into(), request("  ")).await.unwrap_err();
        assert_matches!(err, CoreError::Validation(_));

        assert!(jobs.is_empty().await);
        assert_eq!(orch.in_flight(), 0);
    }

    #[tokio::test]
    async fn submit_acknowledges_while_generation_is_blocked() {
        let generator = GatedGenerator::new();
        let (_dir, jobs, orch) = orchestrator(generator.clone(), LIMITS).await;

        let ack = orch.submit("p1".into(), request("fox")).await.unwrap();
        assert_eq!(ack.status, "started");
        assert_eq!(ack.job_id, "p1");
        assert_eq!(jobs.get("p1").await.unwrap().status, JobStatus::Pending);

        generator.gate.notify_waiters();
        // notify_waiters only wakes current waiters; keep releasing until done.
        for _ in 0..200 {
            if jobs.get("p1").await.unwrap().status == JobStatus::Done {
                break;
            }
            generator.gate.notify_one();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let job = jobs.get("p1").await.unwrap();
        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(job.artifact, Some(ArtifactRef::new("p1", ArtifactFormat::Jpeg)));
    }

    #[tokio::test]
    async fn concurrency_is_capped_and_queue_overflow_is_rejected() {
        let generator = GatedGenerator::new();
        let (_dir, jobs, orch) = orchestrator(generator.clone(), LIMITS).await;

        for id in ["a", "b", "c"] {
            orch.submit(id.into(), request("fox")).await.unwrap();
        }
        assert_eq!(orch.in_flight(), 3);

        // Fourth admission exceeds max_queued.
        let err = orch.submit("d".into(), request("fox")).await.unwrap_err();
        assert_matches!(err, CoreError::Overloaded(_));
        assert!(jobs.get("d").await.is_none());

        // Give tasks a chance to reach the generator; only two may enter.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(generator.active.load(Ordering::SeqCst), 2);

        for _ in 0..300 {
            generator.gate.notify_one();
            tokio::time::sleep(Duration::from_millis(5)).await;
            if orch.in_flight() == 0 {
                break;
            }
        }

        for id in ["a", "b", "c"] {
            wait_for_status(&jobs, id, JobStatus::Done).await;
        }
        assert_eq!(generator.peak.load(Ordering::SeqCst), 2);
        assert_eq!(orch.in_flight(), 0);
    }

    #[tokio::test]
    async fn panicking_generator_marks_job_failed() {
        let (_dir, jobs, orch) = orchestrator(Arc::new(PanickingGenerator), LIMITS).await;

        orch.submit("p1".into(), request("fox")).await.unwrap();
        wait_for_status(&jobs, "p1", JobStatus::Failed).await;

        let job = jobs.get("p1").await.unwrap();
        assert!(job.error.unwrap().starts_with("Generation task aborted"));
        assert_eq!(orch.in_flight(), 0);
    }

    #[tokio::test]
    async fn shutdown_waits_for_in_flight_and_closes_admission() {
        let generator = GatedGenerator::new();
        let (_dir, jobs, orch) = orchestrator(generator.clone(), LIMITS).await;
        orch.submit("p1".into(), request("fox")).await.unwrap();

        // Still blocked: shutdown times out.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!orch.shutdown(Duration::from_millis(20)).await);

        let err = orch.submit("p2".into(), request("fox")).await.unwrap_err();
        assert_matches!(err, CoreError::Overloaded(_));

        generator.gate.notify_one();
        assert!(orch.shutdown(Duration::from_secs(2)).await);
        assert_eq!(jobs.get("p1").await.unwrap().status, JobStatus::Done);
    }

    #[tokio::test]
    async fn late_superseded_attempt_leaves_newer_artifact_intact() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = Arc::new(LocalArtifactStore::open(dir.path()).await.unwrap());
        let jobs = Arc::new(JobStore::new());
        let orch = JobOrchestrator::new(
            Arc::clone(&jobs),
            artifacts.clone(),
            Arc::new(SlowFirstGenerator),
            LIMITS,
        );

        orch.submit("p1".into(), request("first")).await.unwrap();
        let transparent = GenerationRequest {
            transparent_background: true,
            ..request("second")
        };
        orch.submit("p1".into(), transparent).await.unwrap();

        // Drain both tasks; the first one finishes last.
        assert!(orch.shutdown(Duration::from_secs(5)).await);

        let job = jobs.get("p1").await.unwrap();
        assert_eq!(job.status, JobStatus::Done);
        let png = ArtifactRef::new("p1", ArtifactFormat::Png);
        assert_eq!(job.artifact, Some(png.clone()));
        assert_eq!(artifacts.read(&png).await.unwrap(), b"image:second");

        let jpg = ArtifactRef::new("p1", ArtifactFormat::Jpeg);
        assert_matches!(artifacts.read(&jpg).await, Err(ArtifactError::NotFound(_)));
    }
}
