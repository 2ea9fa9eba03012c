//! Eviction planning
//!
//! Pure selection over an entry listing. The manager deletes what these
//! return; nothing here touches storage.

use chrono::{DateTime, Utc};
use zrata_domain::{EntryMetadata, Fingerprint};

/// Entries created strictly before `cutoff`
pub fn older_than(entries: &[EntryMetadata], cutoff: DateTime<Utc>) -> Vec<Fingerprint> {
    entries
        .iter()
        .filter(|entry| entry.created_at < cutoff)
        .map(|entry| entry.fingerprint.clone())
        .collect()
}

/// Oldest entries to drop so the remaining total fits in `max_total_bytes`
pub fn to_fit_budget(entries: &[EntryMetadata], max_total_bytes: u64) -> Vec<Fingerprint> {
    let mut ordered: Vec<&EntryMetadata> = entries.iter().collect();
    ordered.sort_by_key(|entry| entry.created_at);

    let mut total: u64 = ordered.iter().map(|entry| entry.size_bytes).sum();
    let mut victims = Vec::new();
    for entry in ordered {
        if total <= max_total_bytes {
            break;
        }
        total = total.saturating_sub(entry.size_bytes);
        victims.push(entry.fingerprint.clone());
    }
    victims
}
