//! Fingerprint newtype

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::FINGERPRINT_HEX_LEN;
use crate::errors::CacheError;

/// Stable identity of a computation request
///
/// Always 64 lowercase hex characters. Construct through
/// [`Fingerprint::parse`] or the hasher; the inner string is never exposed
/// mutably, so an instance is valid for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Validate and wrap a hex digest
    ///
    /// Uppercase input is accepted and lowered so that storage keys stay
    /// case-stable.
    pub fn parse(value: &str) -> Result<Self, CacheError> {
        if value.len() != FINGERPRINT_HEX_LEN {
            return Err(CacheError::invalid_request(format!(
                "fingerprint must be {FINGERPRINT_HEX_LEN} hex characters, got {}",
                value.len()
            )));
        }
        if !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CacheError::invalid_request("fingerprint contains non-hex characters"));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, for log lines
    pub fn short(&self) -> &str {
        &self.0[..12]
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Fingerprint {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = CacheError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_and_lowercases_hex() {
        let fp = Fingerprint::parse(&"AB".repeat(32)).unwrap();
        assert_eq!(fp.as_str(), "ab".repeat(32));
        assert_eq!(fp.short(), "abababababab");
    }

    #[test]
    fn parse_rejects_bad_length_and_alphabet() {
        assert!(matches!(Fingerprint::parse("abc"), Err(CacheError::InvalidRequest(_))));
        let bad = format!("{}zz", "a".repeat(62));
        assert!(matches!(Fingerprint::parse(&bad), Err(CacheError::InvalidRequest(_))));
    }

    #[test]
    fn serde_validates_on_deserialize() {
        let good = format!("\"{}\"", "0".repeat(64));
        let fp: Fingerprint = serde_json::from_str(&good).unwrap();
        assert_eq!(serde_json::to_string(&fp).unwrap(), good);

        assert!(serde_json::from_str::<Fingerprint>("\"not-a-digest\"").is_err());
    }
}
