//! Stored cache entries

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ComputationRequest, Fingerprint};

/// Strategy and dataset that produced an entry
///
/// Stored next to the payload so results can be listed or dropped per
/// dataset (after a re-upload) or per strategy (after a code change).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryOrigin {
    pub strategy_identifier: String,
    pub dataset_fingerprint: String,
}

impl EntryOrigin {
    pub fn new(strategy_identifier: impl Into<String>, dataset_fingerprint: impl Into<String>) -> Self {
        Self {
            strategy_identifier: strategy_identifier.into(),
            dataset_fingerprint: dataset_fingerprint.into(),
        }
    }

    pub fn of(request: &ComputationRequest) -> Self {
        Self::new(request.strategy_identifier(), request.dataset_fingerprint())
    }
}

/// A computed result persisted under its fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub origin: EntryOrigin,
    pub payload: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
}

impl CacheEntry {
    /// Entry stamped with the current time
    pub fn new(fingerprint: Fingerprint, origin: EntryOrigin, payload: Vec<u8>) -> Self {
        Self::with_created_at(fingerprint, origin, payload, Utc::now())
    }

    pub fn with_created_at(
        fingerprint: Fingerprint,
        origin: EntryOrigin,
        payload: Vec<u8>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let size_bytes = payload.len() as u64;
        Self { fingerprint, origin, payload, created_at, size_bytes }
    }

    /// Payload-free view of this entry
    pub fn metadata(&self) -> EntryMetadata {
        EntryMetadata {
            fingerprint: self.fingerprint.clone(),
            origin: self.origin.clone(),
            created_at: self.created_at,
            size_bytes: self.size_bytes,
        }
    }
}

/// What enumeration returns: everything but the payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub fingerprint: Fingerprint,
    pub origin: EntryOrigin,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
}

/// Totals over everything currently stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSummary {
    pub total_records: usize,
    pub total_bytes: u64,
    /// Distinct dataset fingerprints
    pub total_datasets: usize,
    /// Distinct strategy identifiers
    pub total_strategies: usize,
}

impl StorageSummary {
    pub fn from_entries(entries: &[EntryMetadata]) -> Self {
        let datasets: BTreeSet<&str> =
            entries.iter().map(|e| e.origin.dataset_fingerprint.as_str()).collect();
        let strategies: BTreeSet<&str> =
            entries.iter().map(|e| e.origin.strategy_identifier.as_str()).collect();
        Self {
            total_records: entries.len(),
            total_bytes: entries.iter().map(|e| e.size_bytes).sum(),
            total_datasets: datasets.len(),
            total_strategies: strategies.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(c: char) -> Fingerprint {
        Fingerprint::parse(&c.to_string().repeat(64)).unwrap()
    }

    #[test]
    fn size_tracks_payload() {
        let origin = EntryOrigin::new("sma_crossover", "abc123");
        let entry = CacheEntry::new(fp('1'), origin.clone(), b"{\"trades\":3}".to_vec());
        assert_eq!(entry.size_bytes, 12);

        let meta = entry.metadata();
        assert_eq!(meta.fingerprint, fp('1'));
        assert_eq!(meta.origin, origin);
        assert_eq!(meta.created_at, entry.created_at);
        assert_eq!(meta.size_bytes, 12);
    }

    #[test]
    fn origin_comes_from_request() {
        let request = ComputationRequest::builder("rsi").param("period", 14).dataset("d9").build();
        assert_eq!(EntryOrigin::of(&request), EntryOrigin::new("rsi", "d9"));
    }

    /// Validates summary totals over a mixed listing.
    ///
    /// Assertions:
    /// - distinct datasets and strategies are counted once each
    /// - bytes are summed over every record
    #[test]
    fn summary_counts_distinct_origins() {
        let entries: Vec<EntryMetadata> = [
            (fp('a'), "sma", "d1", 10),
            (fp('b'), "sma", "d2", 20),
            (fp('c'), "rsi", "d1", 5),
        ]
        .into_iter()
        .map(|(fingerprint, strategy, dataset, size_bytes)| EntryMetadata {
            fingerprint,
            origin: EntryOrigin::new(strategy, dataset),
            created_at: Utc::now(),
            size_bytes,
        })
        .collect();

        let summary = StorageSummary::from_entries(&entries);
        assert_eq!(
            summary,
            StorageSummary { total_records: 3, total_bytes: 35, total_datasets: 2, total_strategies: 2 }
        );
        assert_eq!(StorageSummary::from_entries(&[]), StorageSummary::default());
    }
}
