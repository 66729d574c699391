use std::path::Path as FsPath;

use axum::Json;
use axum::body::Body;
use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use relay_core::generate_key;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use super::AppState;
use super::client::ClientAddr;
use super::schemas::{ErrorResponse, UploadForm, UploadResponse};
use crate::error::ServiceError;

const FILE_FIELD: &str = "file";
const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// `POST /files` -- store the multipart `file` part and return its keys.
#[utoipa::path(
    post,
    path = "/files",
    tag = "Files",
    summary = "Upload a file",
    description = "Stores the multipart `file` part. Counts against the caller's daily upload quota.",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "File stored", body = UploadResponse),
        (status = 413, description = "Body larger than the configured limit"),
        (status = 422, description = "No `file` part in the request", body = ErrorResponse),
        (status = 429, description = "Daily upload quota exhausted", body = ErrorResponse),
        (status = 500, description = "Backend failure", body = ErrorResponse)
    )
)]
pub async fn upload(
    State(state): State<AppState>,
    ClientAddr(client): ClientAddr,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ServiceError> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::Validation(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let mime_type = field
            .content_type()
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_owned();
        let temp_path = state.temp_dir.join(generate_key());
        let size = match spool(&mut field, &temp_path).await {
            Ok(size) => size,
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(e);
            }
        };

        let keys = state
            .service
            .upload(&temp_path, &mime_type, size, &client)
            .await?;
        return Ok((StatusCode::CREATED, Json(UploadResponse::from(keys))));
    }

    Err(ServiceError::Validation(format!(
        "missing multipart field '{FILE_FIELD}'"
    )))
}

/// Write one multipart field to `path`, returning the byte count.
async fn spool(field: &mut Field<'_>, path: &FsPath) -> Result<u64, ServiceError> {
    let io_error = |e: std::io::Error| {
        warn!(path = %path.display(), error = %e, "upload spool failed");
        ServiceError::BackendUnavailable(format!("temp spool: {e}"))
    };

    let mut file = tokio::fs::File::create(path).await.map_err(io_error)?;
    let mut size: u64 = 0;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ServiceError::Validation(e.body_text()))?
    {
        file.write_all(&chunk).await.map_err(io_error)?;
        size += chunk.len() as u64;
    }
    file.flush().await.map_err(io_error)?;
    Ok(size)
}

/// `GET /files/{public_key}` -- stream the stored content.
#[utoipa::path(
    get,
    path = "/files/{key}",
    tag = "Files",
    summary = "Download a file",
    description = "Streams the content with its original MIME type. Refreshes the file's activity and counts against the caller's daily download quota.",
    params(("key" = String, Path, description = "Public key returned by the upload")),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 404, description = "No file with this public key", body = ErrorResponse),
        (status = 429, description = "Daily download quota exhausted", body = ErrorResponse),
        (status = 500, description = "Backend failure", body = ErrorResponse)
    )
)]
pub async fn download(
    State(state): State<AppState>,
    ClientAddr(client): ClientAddr,
    Path(public_key): Path<String>,
) -> Result<Response, ServiceError> {
    let download = state.service.download(&public_key, &client).await?;
    let headers = [
        (header::CONTENT_TYPE, download.mime_type),
        (header::CONTENT_LENGTH, download.size.to_string()),
    ];
    Ok((headers, Body::from_stream(download.stream)).into_response())
}

/// `DELETE /files/{private_key}` -- remove the file owned by the key.
#[utoipa::path(
    delete,
    path = "/files/{key}",
    tag = "Files",
    summary = "Delete a file",
    params(("key" = String, Path, description = "Private key returned by the upload")),
    responses(
        (status = 204, description = "File deleted"),
        (status = 404, description = "No file with this private key", body = ErrorResponse),
        (status = 500, description = "Backend failure", body = ErrorResponse)
    )
)]
pub async fn delete(
    State(state): State<AppState>,
    Path(private_key): Path<String>,
) -> Result<StatusCode, ServiceError> {
    state.service.delete(&private_key).await?;
    Ok(StatusCode::NO_CONTENT)
}
