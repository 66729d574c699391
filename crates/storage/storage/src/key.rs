use relay_core::generate_key;

use crate::error::StorageError;

/// Generate the object name for a newly stored file.
pub fn new_object_key() -> String {
    generate_key()
}

/// Reject keys that are empty or could address something outside the
/// backend's namespace.
pub fn check_key(key: &str) -> Result<&str, StorageError> {
    if key.is_empty()
        || key == "."
        || key.contains("..")
        || key.contains('/')
        || key.contains('\\')
        || key.contains('\0')
    {
        return Err(StorageError::InvalidKey(key.to_owned()));
    }
    Ok(key)
}

/// Apply an optional backend prefix to a key. The prefix never leaks into
/// the key handed back to callers.
pub fn prefixed(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(p) if !p.is_empty() => format!("{}/{key}", p.trim_end_matches('/')),
        _ => key.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_pass_validation() {
        let key = new_object_key();
        assert_eq!(check_key(&key).unwrap(), key);
    }

    #[test]
    fn traversal_and_separators_are_rejected() {
        for bad in ["", ".", "..", "../etc/passwd", "a/b", "a\\b", "x..y", "nul\0"] {
            assert!(
                matches!(check_key(bad), Err(StorageError::InvalidKey(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn prefix_is_joined_once() {
        assert_eq!(prefixed(None, "k"), "k");
        assert_eq!(prefixed(Some(""), "k"), "k");
        assert_eq!(prefixed(Some("uploads"), "k"), "uploads/k");
        assert_eq!(prefixed(Some("uploads/"), "k"), "uploads/k");
    }
}
