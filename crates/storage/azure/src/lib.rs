//! Azure Blob Storage backend for the relay file storage contract.

mod auth;
pub mod config;
mod error;
mod storage;

pub use config::AzureBlobStorageConfig;
pub use storage::AzureBlobFileStorage;
