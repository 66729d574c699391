//! Google Cloud Storage backend for the relay file storage contract.

pub mod config;
mod error;
mod storage;

pub use config::GcsStorageConfig;
pub use storage::GcsFileStorage;
