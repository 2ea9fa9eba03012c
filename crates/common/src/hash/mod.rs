//! Content digests
//!
//! Streaming SHA-256 / BLAKE3 digests rendered as lowercase hex. Both
//! algorithms produce 256-bit digests, so every fingerprint is 64 hex chars
//! regardless of the configured algorithm.

pub mod algorithm;
pub mod digester;

pub use algorithm::HashAlgorithm;
pub use digester::{digest_hex, Digester, DIGEST_HEX_LEN};
