use zrata_common::hash::{digest_hex, Digester, HashAlgorithm};
use zrata_domain::constants::{DEFAULT_FLOAT_PRECISION, MAX_FLOAT_PRECISION};
use zrata_domain::{CacheError, ComputationRequest, Fingerprint, HashingSettings, Result};

use super::canonical::{render_map, CanonicalEncoder};

/// Derives fingerprints from computation requests
///
/// Pure and cheap to clone. Two requests with the same strategy, dataset and
/// normalized parameters always produce the same fingerprint for a given
/// algorithm and float precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerprintHasher {
    algorithm: HashAlgorithm,
    float_precision: u8,
}

impl Default for FingerprintHasher {
    fn default() -> Self {
        Self { algorithm: HashAlgorithm::default(), float_precision: DEFAULT_FLOAT_PRECISION }
    }
}

impl FingerprintHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm, ..Self::default() }
    }

    pub fn from_settings(settings: &HashingSettings) -> Self {
        Self::new(settings.algorithm).with_float_precision(settings.float_precision)
    }

    /// Fractional digits kept for floats, clamped to `1..=17`
    #[must_use]
    pub fn with_float_precision(mut self, precision: u8) -> Self {
        self.float_precision = precision.clamp(1, MAX_FLOAT_PRECISION);
        self
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn float_precision(&self) -> u8 {
        self.float_precision
    }

    /// Fingerprint a request
    ///
    /// # Errors
    /// `InvalidRequest` when the strategy or dataset is empty, a parameter
    /// key is empty, or a float parameter is NaN or infinite.
    pub fn fingerprint(&self, request: &ComputationRequest) -> Result<Fingerprint> {
        let bytes = self.canonical_bytes(request)?;
        let mut digester = Digester::new(self.algorithm);
        digester.update(&bytes);
        Fingerprint::parse(&digester.finalize_hex())
    }

    /// The exact bytes that get digested
    pub fn canonical_bytes(&self, request: &ComputationRequest) -> Result<Vec<u8>> {
        validate(request)?;

        let mut encoder = CanonicalEncoder::new(self.float_precision);
        encoder.write_str(request.strategy_identifier());
        encoder.write_map(request.parameters())?;
        encoder.write_str(request.dataset_fingerprint());
        Ok(encoder.finish())
    }

    /// Readable canonical form of the parameters, for logs
    pub fn canonical_parameters(&self, request: &ComputationRequest) -> Result<String> {
        render_map(request.parameters(), self.float_precision)
    }

    /// Content hash of a raw dataset
    ///
    /// Lets the data layer key datasets by what they contain rather than
    /// where they were loaded from.
    pub fn dataset_fingerprint_of(&self, bytes: &[u8]) -> String {
        digest_hex(self.algorithm, bytes)
    }
}

fn validate(request: &ComputationRequest) -> Result<()> {
    if request.strategy_identifier().trim().is_empty() {
        return Err(CacheError::invalid_request("strategy identifier must not be empty"));
    }
    if request.dataset_fingerprint().trim().is_empty() {
        return Err(CacheError::invalid_request("dataset fingerprint must not be empty"));
    }
    Ok(())
}
