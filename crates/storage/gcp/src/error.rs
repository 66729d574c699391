use relay_storage::error::StorageError;

/// Classify a Cloud Storage error string into a [`StorageError`].
pub(crate) fn classify_gcp_error(key: &str, error_str: &str) -> StorageError {
    let lower = error_str.to_lowercase();
    if lower.contains("not_found")
        || lower.contains("notfound")
        || lower.contains("not found")
        || lower.contains("404")
    {
        StorageError::NotFound(key.to_owned())
    } else if lower.contains("permission_denied") || lower.contains("unauthenticated") {
        StorageError::Configuration(error_str.to_owned())
    } else {
        StorageError::BackendUnavailable(error_str.to_owned())
    }
}
