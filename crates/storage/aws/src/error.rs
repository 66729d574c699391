use relay_storage::error::StorageError;

/// Classify an AWS SDK error string into a [`StorageError`].
pub(crate) fn classify_sdk_error(key: &str, error_str: &str) -> StorageError {
    let lower = error_str.to_lowercase();
    if lower.contains("nosuchkey") || lower.contains("not found") {
        StorageError::NotFound(key.to_owned())
    } else if lower.contains("nosuchbucket") || lower.contains("credential") {
        StorageError::Configuration(error_str.to_owned())
    } else {
        StorageError::BackendUnavailable(error_str.to_owned())
    }
}
