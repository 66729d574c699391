pub mod error;
pub mod key;
pub mod storage;
pub mod testing;

pub use error::StorageError;
pub use key::{check_key, new_object_key, prefixed};
pub use storage::{ByteStream, FileStorage, collect_bytes};
