use relay_storage::error::StorageError;

/// Classify an Azure SDK error string into a [`StorageError`].
pub(crate) fn classify_azure_error(key: &str, error_str: &str) -> StorageError {
    let lower = error_str.to_lowercase();
    if lower.contains("blobnotfound") || lower.contains("404") {
        StorageError::NotFound(key.to_owned())
    } else if lower.contains("containernotfound")
        || lower.contains("authorization")
        || lower.contains("403")
    {
        StorageError::Configuration(error_str.to_owned())
    } else {
        StorageError::BackendUnavailable(error_str.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_not_found_maps_to_not_found() {
        assert!(matches!(
            classify_azure_error("k", "HttpResponse(404, \"BlobNotFound\")"),
            StorageError::NotFound(_)
        ));
    }

    #[test]
    fn auth_failures_are_configuration_errors() {
        assert!(matches!(
            classify_azure_error("k", "HttpResponse(403, \"AuthorizationFailure\")"),
            StorageError::Configuration(_)
        ));
    }

    #[test]
    fn connection_failures_are_unavailable() {
        assert!(matches!(
            classify_azure_error("k", "connection refused"),
            StorageError::BackendUnavailable(_)
        ));
    }
}
