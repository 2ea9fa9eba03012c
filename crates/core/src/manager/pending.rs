//! In-flight computation claims
//!
//! One entry per fingerprint that is currently being computed. The owner
//! holds a [`ClaimGuard`]; everyone else gets a receiver for the owner's
//! outcome. Releasing the claim removes the entry before publishing, so a
//! caller arriving afterwards starts fresh instead of inheriting a finished
//! outcome.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::warn;
use zrata_common::cache::MetricsCollector;
use zrata_domain::{CacheError, Fingerprint};

/// How a claimed computation ended
#[derive(Debug, Clone)]
pub(crate) enum Outcome {
    /// The result is in storage
    Stored,
    /// The owner failed or was dropped; waiters get the same error
    Failed(CacheError),
}

pub(crate) type Signal = watch::Receiver<Option<Outcome>>;

/// Result of trying to claim a fingerprint
pub(crate) enum Claim<'a> {
    Owner(ClaimGuard<'a>),
    Waiter(Signal),
}

/// Table of fingerprints with a computation in flight
#[derive(Debug)]
pub(crate) struct PendingTable {
    claims: DashMap<Fingerprint, Signal>,
    metrics: MetricsCollector,
}

impl PendingTable {
    pub(crate) fn new(metrics: MetricsCollector) -> Self {
        Self { claims: DashMap::new(), metrics }
    }

    /// Claim `fingerprint`, or join whoever already holds it
    pub(crate) fn claim(&self, fingerprint: &Fingerprint) -> Claim<'_> {
        match self.claims.entry(fingerprint.clone()) {
            Entry::Occupied(existing) => Claim::Waiter(existing.get().clone()),
            Entry::Vacant(slot) => {
                let (tx, rx) = watch::channel(None);
                slot.insert(rx);
                Claim::Owner(ClaimGuard {
                    table: self,
                    fingerprint: fingerprint.clone(),
                    tx,
                    released: false,
                })
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.claims.len()
    }
}

/// Ownership of one claim
///
/// Dropping the guard without calling [`release`](Self::release) publishes
/// `ComputationAborted` so waiters never hang on a cancelled owner.
pub(crate) struct ClaimGuard<'a> {
    table: &'a PendingTable,
    fingerprint: Fingerprint,
    tx: watch::Sender<Option<Outcome>>,
    released: bool,
}

impl ClaimGuard<'_> {
    /// Remove the claim and wake every waiter with `outcome`
    pub(crate) fn release(mut self, outcome: Outcome) {
        self.publish(outcome);
    }

    fn publish(&mut self, outcome: Outcome) {
        self.released = true;
        self.table.claims.remove(&self.fingerprint);
        // send_replace never fails, even with no receivers left
        self.tx.send_replace(Some(outcome));
    }
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        warn!(fingerprint = %self.fingerprint, "Computation dropped before completing");
        self.table.metrics.record_abort();
        let aborted = CacheError::ComputationAborted(self.fingerprint.clone());
        self.publish(Outcome::Failed(aborted));
    }
}

/// Wait for the owner's outcome
///
/// A sender that disappears without publishing counts as an abort.
pub(crate) async fn next_outcome(mut signal: Signal, fingerprint: &Fingerprint) -> Outcome {
    match signal.wait_for(Option::is_some).await {
        Ok(outcome) => outcome
            .clone()
            .unwrap_or_else(|| Outcome::Failed(CacheError::ComputationAborted(fingerprint.clone()))),
        Err(_) => Outcome::Failed(CacheError::ComputationAborted(fingerprint.clone())),
    }
}
