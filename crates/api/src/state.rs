use std::sync::Arc;

use pagesmith_store::{ArtifactStore, JobStore};

use crate::config::ServerConfig;
use crate::engine::orchestrator::JobOrchestrator;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// In-memory job records.
    pub jobs: Arc<JobStore>,
    /// Generated image storage (served under `/generated`).
    pub artifacts: Arc<dyn ArtifactStore>,
    /// Accepts submissions and runs generations in the background.
    pub orchestrator: Arc<JobOrchestrator>,
}
