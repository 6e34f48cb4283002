use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use pagesmith_core::job::{ArtifactRef, Job, JobStatus};
use pagesmith_core::types::Timestamp;
use tokio::sync::RwLock;

/// Result of one background generation, written back via [`JobStore::finish`].
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Done(ArtifactRef),
    Failed { reason: String },
}

/// In-memory map from job id to its current record.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared between the orchestrator and the HTTP handlers. Every mutation
/// touches a single key, so no cross-job locking is needed.
pub struct JobStore {
    jobs: RwLock<HashMap<String, Job>>,
    next_attempt: AtomicU64,
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            next_attempt: AtomicU64::new(1),
        }
    }

    /// Record a new submission of `job_id` as `pending`.
    ///
    /// Any previous record for the same id is replaced (last writer wins).
    /// Returns the stored record; its `attempt` must be passed back to
    /// [`finish`](Self::finish).
    pub async fn begin(&self, job_id: &str) -> Job {
        let attempt = self.next_attempt.fetch_add(1, Ordering::Relaxed);
        let job = Job::pending(job_id, attempt);

        let previous = self
            .jobs
            .write()
            .await
            .insert(job_id.to_string(), job.clone());

        if let Some(prev) = previous {
            tracing::debug!(
                job_id,
                previous_status = %prev.status,
                previous_attempt = prev.attempt,
                "Job id re-submitted, replacing previous record",
            );
        }

        job
    }

    /// Apply the outcome of a background generation.
    ///
    /// Only a `pending` record whose `attempt` matches is updated; terminal
    /// records never change and a stale attempt (the id was re-submitted
    /// meanwhile) is ignored. Returns whether the record was updated.
    pub async fn finish(&self, job_id: &str, attempt: u64, outcome: JobOutcome) -> bool {
        let mut jobs = self.jobs.write().await;

        let Some(job) = jobs.get_mut(job_id) else {
            tracing::warn!(job_id, attempt, "Finished job has no record, ignoring outcome");
            return false;
        };

        if job.attempt != attempt || job.status.is_terminal() {
            tracing::debug!(
                job_id,
                attempt,
                current_attempt = job.attempt,
                current_status = %job.status,
                "Ignoring stale job outcome",
            );
            return false;
        }

        match outcome {
            JobOutcome::Done(artifact) => {
                job.status = JobStatus::Done;
                job.artifact = Some(artifact);
            }
            JobOutcome::Failed { reason } => {
                job.status = JobStatus::Failed;
                job.error = Some(reason);
            }
        }
        job.completed_at = Some(chrono::Utc::now());

        true
    }

    /// Current record for `job_id`, if any.
    pub async fn get(&self, job_id: &str) -> Option<Job> {
        self.jobs.read().await.get(job_id).cloned()
    }

    /// Whether `attempt` is still the pending submission of `job_id`, i.e.
    /// whether [`finish`](Self::finish) would apply its outcome.
    pub async fn is_current(&self, job_id: &str, attempt: u64) -> bool {
        self.jobs
            .read()
            .await
            .get(job_id)
            .is_some_and(|j| j.attempt == attempt && j.status == JobStatus::Pending)
    }

    /// Total number of records held.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Drop `done` records that completed before `cutoff`.
    ///
    /// A `done` job still resolves through its artifact once purged. Pending
    /// and failed records are kept: a failure leaves nothing on disk, so
    /// dropping it would turn the job back into `pending`. Returns the
    /// number removed.
    pub async fn purge_completed_before(&self, cutoff: Timestamp) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| match job.completed_at {
            Some(done_at) if job.status == JobStatus::Done => done_at >= cutoff,
            _ => true,
        });
        before - jobs.len()
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}
