use thiserror::Error;

/// Errors from rate limiter operations.
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("rate limit backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}
