use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::service::{HealthReport, UploadedKeys};

/// Keys returned after a successful upload.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Key that downloads the file.
    #[schema(example = "3f2a9c1e5b7d4f6a8c0e2b4d6f8a0c1e")]
    pub public_key: String,
    /// Key that deletes the file. Keep it secret.
    #[schema(example = "9b8c7d6e5f4a3b2c1d0e9f8a7b6c5d4e")]
    pub private_key: String,
}

impl From<UploadedKeys> for UploadResponse {
    fn from(keys: UploadedKeys) -> Self {
        Self {
            public_key: keys.public_key,
            private_key: keys.private_key,
        }
    }
}

/// Multipart body of `POST /files`. Only described, never built: the
/// handler reads the multipart stream directly.
#[derive(Debug, ToSchema)]
pub struct UploadForm {
    /// The file to relay.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// Error body shared by every failing request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "file not found")]
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Whether every backend answered its liveness check.
    pub healthy: bool,
    /// Seconds since the server started.
    pub uptime: i64,
    pub timestamp: DateTime<Utc>,
    /// Rate limiter liveness, only with `?detail`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<bool>,
    /// File repository liveness, only with `?detail`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db: Option<bool>,
    /// File storage liveness, only with `?detail`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<bool>,
}

impl HealthResponse {
    pub fn new(report: &HealthReport, detail: bool) -> Self {
        let backend = |live: bool| detail.then_some(live);
        Self {
            healthy: report.healthy,
            uptime: report.uptime,
            timestamp: report.timestamp,
            cache: backend(report.cache),
            db: backend(report.db),
            storage: backend(report.storage),
        }
    }
}
