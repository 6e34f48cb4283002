//! In-process job state and artifact persistence.
//!
//! [`JobStore`] owns every job record for the lifetime of the process.
//! [`ArtifactStore`] persists generated images keyed by job id;
//! [`LocalArtifactStore`] is the flat-directory implementation.

pub mod artifacts;
pub mod jobs;

pub use artifacts::{ArtifactError, ArtifactStore, LocalArtifactStore};
pub use jobs::{JobOutcome, JobStore};
