use uuid::Uuid;

/// Length in characters of every generated key.
pub const KEY_LEN: usize = 32;

/// Generate an opaque, unguessable identifier.
///
/// Keys are random (v4) UUIDs rendered as 32 lowercase hex characters with no
/// separators. The same generator produces public keys, private keys and
/// storage object names.
pub fn generate_key() -> String {
    Uuid::new_v4().simple().to_string()
}
