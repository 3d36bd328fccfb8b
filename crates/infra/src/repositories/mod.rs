//! Key repository implementations

pub mod file_system;
pub mod memory;

pub use file_system::FileSystemKeyRepository;
pub use memory::InMemoryKeyRepository;
