//! Storage port and the in-memory adapter

mod memory;
mod ports;

pub use memory::MemoryCacheStorage;
pub use ports::{check_existing, CacheStorage};
