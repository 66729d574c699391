//! Amazon S3 backend for the relay file storage contract.
//!
//! Each stored file becomes one object in the configured bucket, optionally
//! under a key prefix. Credentials come from the standard AWS environment
//! chain unless a static access key pair is configured.

pub mod auth;
pub mod config;
mod error;
mod storage;

pub use config::S3StorageConfig;
pub use storage::S3FileStorage;
