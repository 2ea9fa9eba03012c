//! SQLite storage backend

pub mod cache_repository;
pub mod manager;

pub use cache_repository::SqliteCacheStorage;
pub use manager::DbManager;
