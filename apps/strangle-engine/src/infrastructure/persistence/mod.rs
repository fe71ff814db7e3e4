//! Persistence Adapters
//!
//! Implementations of `StoragePort`.

pub mod in_memory;
pub mod json_file;

pub use in_memory::InMemoryPositionStore;
pub use json_file::JsonFilePositionStore;
