//! Fingerprinting and cache-hit benchmarks
//!
//! Run with: `cargo bench --bench fingerprint_bench -p zrata-core`

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use zrata_core::{CacheManager, FingerprintHasher, MemoryCacheStorage};
use zrata_domain::{ComputationRequest, HashAlgorithm, ParamValue};

fn request_with(params: usize) -> ComputationRequest {
    (0..params)
        .fold(ComputationRequest::builder("grid_search"), |builder, i| {
            let value = if i % 2 == 0 {
                ParamValue::Int(i as i64)
            } else {
                ParamValue::Float(i as f64 * 0.125)
            };
            builder.param(format!("param_{i:03}"), value)
        })
        .dataset("prices-2024-csv")
        .build()
}

fn bench_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint");

    for params in [2usize, 16, 128] {
        let request = request_with(params);
        for algorithm in [HashAlgorithm::Sha256, HashAlgorithm::Blake3] {
            let hasher = FingerprintHasher::new(algorithm);
            group.bench_with_input(
                BenchmarkId::new(algorithm.as_str(), params),
                &request,
                |b, request| b.iter(|| hasher.fingerprint(black_box(request))),
            );
        }
    }

    group.finish();
}

fn bench_cache_hit(c: &mut Criterion) {
    let Ok(runtime) = tokio::runtime::Runtime::new() else {
        return;
    };
    let manager = CacheManager::new(Arc::new(MemoryCacheStorage::new()));
    let request = request_with(16);
    let _ = runtime.block_on(
        manager.get_or_compute(&request, || async { Ok::<_, std::io::Error>(vec![1.5_f64; 256]) }),
    );

    c.bench_function("get_or_compute_hit", |b| {
        b.to_async(&runtime).iter(|| async {
            let value: Vec<f64> = manager
                .get_or_compute(&request, || async { Ok::<_, std::io::Error>(Vec::new()) })
                .await
                .unwrap_or_default();
            black_box(value)
        });
    });
}

criterion_group!(benches, bench_fingerprint, bench_cache_hit);
criterion_main!(benches);
