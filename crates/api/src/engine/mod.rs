//! Generation engine.
//!
//! Contains the orchestrator that admits generation requests and runs them
//! as background tasks, plus the status lookup that combines job records
//! with stored artifacts.

pub mod orchestrator;
pub mod status;
