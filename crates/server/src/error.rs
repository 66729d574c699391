use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use relay_ratelimit::Direction;
use thiserror::Error;

use crate::api::schemas::ErrorResponse;

/// Errors that stop the relay server from starting or running.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A backend selector that is unknown or not compiled into this build.
    #[error("unsupported {kind} provider: {value}")]
    UnsupportedProvider { kind: &'static str, value: String },

    /// A backend could not be constructed.
    #[error("backend error: {0}")]
    Backend(String),

    /// An I/O error (e.g. binding the listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcomes of a file operation that are reported to the caller.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("file not found")]
    NotFound,

    #[error("daily {0} quota exceeded")]
    QuotaExceeded(Direction),

    /// Key generation kept colliding with existing records.
    #[error("could not allocate unique keys")]
    DuplicateKey,

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The request itself is malformed.
    #[error("{0}")]
    Validation(String),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::QuotaExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::DuplicateKey => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Backend details stay in the logs.
        let message = match &self {
            Self::BackendUnavailable(_) => "service temporarily unavailable".to_owned(),
            other => other.to_string(),
        };
        (status, axum::Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses() {
        assert_eq!(ServiceError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ServiceError::QuotaExceeded(Direction::Upload).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ServiceError::BackendUnavailable("redis".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ServiceError::Validation("missing file".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn quota_message_names_direction() {
        let err = ServiceError::QuotaExceeded(Direction::Download);
        assert_eq!(err.to_string(), "daily downloads quota exceeded");
    }
}
