//! Infrastructure error mapping

pub mod conversions;

pub use conversions::{map_join_error, to_cache_error, InfraError};
