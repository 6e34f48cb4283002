//! Domain types shared by every pagesmith crate.
//!
//! Has no internal dependencies so the store, generator client and API
//! layers can all depend on it.

pub mod error;
pub mod job;
pub mod types;
