use sha2::{Digest, Sha256};

use super::algorithm::HashAlgorithm;

/// Length of a hex-encoded 256-bit digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// Incremental digest over either supported algorithm.
///
/// Callers feed bytes with [`update`](Self::update) and finish with
/// [`finalize_hex`](Self::finalize_hex). The state is boxed for BLAKE3 since
/// its hasher is much larger than SHA-256's.
pub enum Digester {
    Sha256(Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl Digester {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            HashAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Sha256(hasher) => hasher.update(bytes),
            Self::Blake3(hasher) => {
                hasher.update(bytes);
            }
        }
    }

    /// Consume the digester and return the lowercase hex digest.
    pub fn finalize_hex(self) -> String {
        match self {
            Self::Sha256(hasher) => format!("{:x}", hasher.finalize()),
            Self::Blake3(hasher) => hex::encode(hasher.finalize().as_bytes()),
        }
    }
}

impl std::fmt::Debug for Digester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Sha256(_) => "sha256",
            Self::Blake3(_) => "blake3",
        };
        f.debug_tuple("Digester").field(&name).finish()
    }
}

/// One-shot digest of `bytes`.
pub fn digest_hex(algorithm: HashAlgorithm, bytes: &[u8]) -> String {
    let mut digester = Digester::new(algorithm);
    digester.update(bytes);
    digester.finalize_hex()
}

#[cfg(test)]
mod tests {
    //! Unit tests for hash::digester.
    use super::*;

    /// Validates `digest_hex` against the published SHA-256 vector for "abc".
    ///
    /// Assertions:
    /// - Confirms the digest equals the FIPS 180-2 test vector.
    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            digest_hex(HashAlgorithm::Sha256, b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    /// Validates incremental updates match the one-shot digest.
    ///
    /// Assertions:
    /// - Confirms split input hashes identically for both algorithms.
    #[test]
    fn test_incremental_matches_one_shot() {
        for algorithm in [HashAlgorithm::Sha256, HashAlgorithm::Blake3] {
            let mut digester = Digester::new(algorithm);
            digester.update(b"date,open,close\n");
            digester.update(b"2024-01-01,100,101\n");
            assert_eq!(
                digester.finalize_hex(),
                digest_hex(algorithm, b"date,open,close\n2024-01-01,100,101\n")
            );
        }
    }

    /// Validates both algorithms yield 64 lowercase hex chars and differ.
    ///
    /// Assertions:
    /// - Confirms `len()` equals `DIGEST_HEX_LEN`.
    /// - Ensures the two algorithms disagree on the same input.
    #[test]
    fn test_digest_shape() {
        let sha = digest_hex(HashAlgorithm::Sha256, b"payload");
        let blake = digest_hex(HashAlgorithm::Blake3, b"payload");

        for hex in [&sha, &blake] {
            assert_eq!(hex.len(), DIGEST_HEX_LEN);
            assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
        assert_ne!(sha, blake);
    }
}
