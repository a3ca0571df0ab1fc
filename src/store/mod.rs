//! Session persistence: pluggable key-value backends and the [`TokenStore`]
//! built on top of them.

pub mod base;
pub mod file_store;
pub mod memory_store;
pub mod token_store;

pub use base::{create_backend, Backend};
pub use file_store::FileBackend;
pub use memory_store::MemoryBackend;
pub use token_store::{TokenStore, ACCESS_KEY, REFRESH_KEY, USER_KEY};
