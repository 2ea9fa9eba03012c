//! Request fingerprinting

mod canonical;
mod hasher;

pub use hasher::FingerprintHasher;
