mod repository;

pub use repository::MemoryFileRepository;
