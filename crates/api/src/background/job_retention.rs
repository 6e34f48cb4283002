//! Periodic cleanup of finished job records.
//!
//! `done` records older than the retention period are dropped from the
//! in-memory job store. Artifacts on disk are untouched, so a purged job
//! still reports `done` through the artifact fallback. Failed records are
//! kept since nothing else remembers the failure.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pagesmith_store::JobStore;
use tokio_util::sync::CancellationToken;

/// How often the cleanup job runs.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(600);

/// Purge `done` records that completed more than `retention_hours` ago.
/// Returns the number of records removed.
pub async fn purge_once(jobs: &JobStore, retention_hours: i64) -> usize {
    let Some(cutoff) = chrono::Duration::try_hours(retention_hours)
        .and_then(|retention| Utc::now().checked_sub_signed(retention))
    else {
        tracing::error!(retention_hours, "Job retention: period out of range, skipping");
        return 0;
    };

    let purged = jobs.purge_completed_before(cutoff).await;
    if purged > 0 {
        tracing::info!(purged, "Job retention: purged finished records");
    } else {
        tracing::debug!("Job retention: nothing to purge");
    }
    purged
}

/// Run the job retention loop until `cancel` is triggered.
pub async fn run(jobs: Arc<JobStore>, retention_hours: i64, cancel: CancellationToken) {
    tracing::info!(
        retention_hours,
        interval_secs = CLEANUP_INTERVAL.as_secs(),
        "Job retention task started"
    );

    let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job retention task stopping");
                break;
            }
            _ = interval.tick() => {
                purge_once(&jobs, retention_hours).await;
            }
        }
    }
}
