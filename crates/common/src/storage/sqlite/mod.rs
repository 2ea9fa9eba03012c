//! SQLite backend implementation
//!
//! Provides an r2d2-based connection pool for plain SQLite databases.

pub mod connection;
pub mod pool;
pub mod pragmas;

pub use connection::SqliteConnection;
pub use pool::{HealthStatus, SqlitePool};
pub use pragmas::apply_connection_pragmas;
