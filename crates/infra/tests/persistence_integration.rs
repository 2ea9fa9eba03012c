//! Cache persistence across process restarts for the on-disk backends.
//!
//! Each test builds a manager over real storage, drops it, reopens the same
//! medium and checks that results survive without recomputation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::sync::Barrier;
use zrata_core::{CacheManager, CacheStorage};
use zrata_domain::{
    CacheError, CacheSettings, ComputationRequest, EntryOrigin, HashAlgorithm, StorageSettings,
};
use zrata_infra::open_storage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Backtest {
    trades: u32,
    sharpe: f64,
    signals: Vec<String>,
}

fn backtest() -> Backtest {
    Backtest { trades: 12, sharpe: 1.37, signals: vec!["buy".into(), "sell".into()] }
}

fn request() -> ComputationRequest {
    ComputationRequest::builder("sma_crossover")
        .param("fast", 10)
        .param("slow", 50)
        .param("stop_loss", 0.02)
        .dataset("abc123")
        .build()
}

fn on_disk_backends(dir: &TempDir) -> [StorageSettings; 2] {
    [
        StorageSettings::sqlite(dir.path().join("cache.db")),
        StorageSettings::filesystem(dir.path().join("entries")),
    ]
}

/// Validates that stored results outlive the manager and storage handles.
///
/// Assertions:
/// - a fresh manager over the reopened medium hits without computing
/// - the payload decodes to the original value
#[tokio::test(flavor = "multi_thread")]
async fn results_survive_reopen() {
    let dir = TempDir::new().expect("temp dir created");

    for settings in on_disk_backends(&dir) {
        let calls = AtomicUsize::new(0);
        {
            let storage = open_storage(&settings).await.unwrap();
            let manager = CacheManager::new(storage);
            let value: Backtest = manager
                .get_or_compute(&request(), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, anyhow::Error>(backtest())
                })
                .await
                .unwrap();
            assert_eq!(value, backtest());
        }

        let storage = open_storage(&settings).await.unwrap();
        let manager = CacheManager::new(storage);
        let value: Backtest = manager
            .get_or_compute(&request(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(Backtest { trades: 0, sharpe: 0.0, signals: vec![] })
            })
            .await
            .unwrap();

        assert_eq!(value, backtest(), "backend {:?}", settings.backend);
        assert_eq!(calls.load(Ordering::SeqCst), 1, "backend {:?}", settings.backend);
        assert_eq!(manager.stats().hits, 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_compute_once_on_disk() {
    let dir = TempDir::new().expect("temp dir created");

    for settings in on_disk_backends(&dir) {
        let manager = Arc::new(CacheManager::new(open_storage(&settings).await.unwrap()));
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(6));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move {
                    barrier.wait().await;
                    manager
                        .get_or_compute(&request(), move || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                            Ok::<_, anyhow::Error>(backtest())
                        })
                        .await
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), backtest());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1, "backend {:?}", settings.backend);
        assert_eq!(manager.storage().list_entries().await.unwrap().len(), 1);
    }
}

#[tokio::test]
async fn collision_is_reported_by_every_backend() {
    let dir = TempDir::new().expect("temp dir created");
    let mut all = on_disk_backends(&dir).to_vec();
    all.push(StorageSettings::memory());

    for settings in all {
        let storage = open_storage(&settings).await.unwrap();
        let manager = CacheManager::new(Arc::clone(&storage));
        let fp = manager.fingerprint(&request()).unwrap();
        let origin = EntryOrigin::of(&request());

        storage.put(&fp, &origin, b"{\"trades\":1}".to_vec()).await.unwrap();
        storage.put(&fp, &origin, b"{\"trades\":1}".to_vec()).await.unwrap();
        let err = storage.put(&fp, &origin, b"{\"trades\":2}".to_vec()).await.unwrap_err();
        assert!(
            matches!(err, CacheError::FingerprintCollisionOrStaleWrite { .. }),
            "backend {:?}: {err:?}",
            settings.backend
        );
    }
}

/// Validates per-dataset eviction and totals on the on-disk backends.
///
/// Assertions:
/// - origins written by one manager are visible after reopening
/// - evicting a re-uploaded dataset leaves other datasets cached
/// - the summary counts distinct datasets and strategies
#[tokio::test(flavor = "multi_thread")]
async fn dataset_eviction_survives_reopen() {
    let dir = TempDir::new().expect("temp dir created");
    let runs = [("sma_crossover", "abc123"), ("rsi", "abc123"), ("sma_crossover", "def456")];

    for settings in on_disk_backends(&dir) {
        {
            let manager = CacheManager::new(open_storage(&settings).await.unwrap());
            for (strategy, dataset) in runs {
                let req = ComputationRequest::builder(strategy).param("period", 14).dataset(dataset).build();
                let _: Backtest = manager
                    .get_or_compute(&req, || async { Ok::<_, anyhow::Error>(backtest()) })
                    .await
                    .unwrap();
            }
        }

        let manager = CacheManager::new(open_storage(&settings).await.unwrap());
        let summary = manager.summary().await.unwrap();
        assert_eq!(
            (summary.total_records, summary.total_datasets, summary.total_strategies),
            (3, 2, 2),
            "backend {:?}",
            settings.backend
        );
        assert_eq!(manager.entries_for_strategy("rsi").await.unwrap().len(), 1);

        assert_eq!(manager.evict_dataset("abc123").await.unwrap(), 2);
        let remaining = manager.storage().list_entries().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].origin, EntryOrigin::new("sma_crossover", "def456"));
        assert_eq!(manager.summary().await.unwrap().total_bytes, remaining[0].size_bytes);
    }
}

#[tokio::test]
async fn settings_drive_hasher_and_backend() {
    let dir = TempDir::new().expect("temp dir created");
    let mut settings = CacheSettings::default();
    settings.storage = StorageSettings::sqlite(dir.path().join("cache.db"));
    settings.hashing.algorithm = HashAlgorithm::Blake3;

    let storage = open_storage(&settings.storage).await.unwrap();
    let manager = CacheManager::from_settings(storage, &settings);
    assert_eq!(manager.hasher().algorithm(), HashAlgorithm::Blake3);

    let sha = CacheManager::new(Arc::new(zrata_core::MemoryCacheStorage::new()));
    assert_ne!(manager.fingerprint(&request()).unwrap(), sha.fingerprint(&request()).unwrap());
}
