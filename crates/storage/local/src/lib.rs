mod storage;

pub use storage::LocalFileStorage;
