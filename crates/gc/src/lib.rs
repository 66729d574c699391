//! Garbage collection of inactive files.
//!
//! A [`GarbageCollector`] periodically asks the repository for records whose
//! last activity is older than the configured threshold and removes each one
//! from storage and then from the repository.

mod collector;
mod config;
mod error;

pub use collector::{GarbageCollector, GcHandle, GcState, SweepReport};
pub use config::{GcConfig, Schedule};
pub use error::GcError;
