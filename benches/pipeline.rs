//! Benchmarks for the synchronous hot path of a request
//!
//! This benchmark measures:
//! - Cache key derivation for short and long prompts
//! - Response validation with and without patterns
//! - In-memory cache round-trips

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use ai_lib_serve::cache::{CacheConfig, KeyDeriver, MemoryStore, ResponseCache};
use ai_lib_serve::validation::{validate, ValidationRules};
use ai_lib_serve::GenerationRequest;
use std::sync::Arc;

fn bench_key_derivation(c: &mut Criterion) {
    let deriver = KeyDeriver::new();
    let mut group = c.benchmark_group("key_derivation");
    for size in [64usize, 4 * 1024, 64 * 1024] {
        let request = GenerationRequest::new("x".repeat(size), "context ".repeat(size / 8));
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &request, |b, req| {
            b.iter(|| deriver.derive_request(black_box(req)))
        });
    }
    group.finish();
}

fn bench_validation(c: &mut Criterion) {
    let response = "A brief valid summary of the document. ".repeat(50);
    let bounds_only = ValidationRules::default();
    let with_patterns = ValidationRules::builder()
        .require_pattern(r"summary")
        .require_pattern(r"\.\s*$")
        .forbid_pattern(r"(?i)as an ai language model")
        .forbid_pattern(r"\b\d{3}-\d{2}-\d{4}\b")
        .build()
        .expect("valid rules");

    c.bench_function("validate_bounds_only", |b| {
        b.iter(|| validate(black_box(&response), &bounds_only))
    });
    c.bench_function("validate_with_patterns", |b| {
        b.iter(|| validate(black_box(&response), &with_patterns))
    });
}

fn bench_memory_cache(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let cache = ResponseCache::new(CacheConfig::default(), Arc::new(MemoryStore::new(10_000)));
    let key = KeyDeriver::new().derive_request(&GenerationRequest::new("Summarize X", ""));
    rt.block_on(cache.set(&key, "A brief valid summary."));

    c.bench_function("memory_cache_hit", |b| {
        b.to_async(&rt).iter(|| async { cache.get(black_box(&key)).await })
    });
}

criterion_group!(benches, bench_key_derivation, bench_validation, bench_memory_cache);
criterion_main!(benches);
