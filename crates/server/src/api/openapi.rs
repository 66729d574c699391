#![allow(clippy::needless_for_each)]

use super::schemas::{ErrorResponse, HealthResponse, UploadForm, UploadResponse};

#[derive(utoipa::OpenApi)]
#[openapi(
    info(
        title = "Relay API",
        description = "Anonymous file relay. Upload a file to get a public key for downloads and a private key for deletion. Uploads and downloads are limited per client per day, and files idle for too long are evicted.",
        license(name = "Apache-2.0")
    ),
    tags(
        (name = "Files", description = "Upload, download and delete relayed files"),
        (name = "Health", description = "Backend liveness")
    ),
    paths(
        super::health::health,
        super::files::upload,
        super::files::download,
        super::files::delete,
    ),
    components(schemas(UploadResponse, UploadForm, ErrorResponse, HealthResponse))
)]
pub struct ApiDoc;
