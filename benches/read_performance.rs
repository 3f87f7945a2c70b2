//! Read-path benchmarks for service-config.
//!
//! - Single-threaded `get()` latency
//! - Concurrent readers
//! - Reads while the provider reloads
//! - Comparison with lock-based caches

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde::Deserialize;
use service_config::prelude::*;
use service_config::sources::MemorySource;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct BenchConfig {
    value: i64,
    name: String,
    flag: bool,
    items: Vec<String>,
}

fn document(value: i64) -> String {
    format!(
        r#"{{"value": {value}, "name": "bench_{value}", "flag": {}, "items": ["a", "b", "c"]}}"#,
        value % 2 == 0
    )
}

fn provider(runtime: &Runtime) -> (ConfigProvider<BenchConfig>, Arc<MemorySource>) {
    let source = Arc::new(MemorySource::new(document(42)));
    let provider = runtime
        .block_on(
            ConfigProvider::builder(ConfigFormat::Json)
                .with_shared_source(Arc::clone(&source) as Arc<dyn ConfigSource>)
                .build::<BenchConfig>(),
        )
        .unwrap();
    (provider, source)
}

/// Benchmark single-threaded read latency
fn benchmark_read_latency(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let (config, _source) = provider(&runtime);

    let mut group = c.benchmark_group("read_latency");
    group.bench_function("single_read", |b| {
        b.iter(|| {
            let cfg = config.get();
            black_box(cfg.value);
        });
    });
    group.finish();
}

/// Benchmark concurrent reads with varying thread counts
fn benchmark_concurrent_reads(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let (config, _source) = provider(&runtime);
    let mut group = c.benchmark_group("concurrent_reads");

    for num_threads in [1, 2, 4, 8, 16] {
        group.throughput(Throughput::Elements(num_threads as u64 * 1000));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_threads", num_threads)),
            &num_threads,
            |b, &num_threads| {
                let barrier = Arc::new(Barrier::new(num_threads + 1));

                b.iter_custom(|iters| {
                    let handles: Vec<_> = (0..num_threads)
                        .map(|_| {
                            let cfg = config.clone();
                            let barrier = Arc::clone(&barrier);
                            thread::spawn(move || {
                                barrier.wait();
                                let start = Instant::now();
                                for _ in 0..iters {
                                    black_box(cfg.get().value);
                                }
                                start.elapsed()
                            })
                        })
                        .collect();

                    barrier.wait();
                    let total: Duration = handles.into_iter().map(|h| h.join().unwrap()).sum();
                    total / num_threads as u32
                });
            },
        );
    }

    group.finish();
}

/// Benchmark reloads while 16 readers hammer `get()`
fn benchmark_reload_under_load(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();

    let mut group = c.benchmark_group("reload_under_load");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("reload_with_16_readers", |b| {
        b.iter_custom(|iters| {
            let (config, source) = provider(&runtime);
            runtime.block_on(async move {
                let running = Arc::new(AtomicBool::new(true));
                let reads = Arc::new(AtomicUsize::new(0));

                let readers: Vec<_> = (0..16)
                    .map(|_| {
                        let cfg = config.clone();
                        let running = Arc::clone(&running);
                        let reads = Arc::clone(&reads);
                        tokio::spawn(async move {
                            while running.load(Ordering::Relaxed) {
                                black_box(cfg.get().value);
                                reads.fetch_add(1, Ordering::Relaxed);
                                tokio::task::yield_now().await;
                            }
                        })
                    })
                    .collect();

                let start = Instant::now();
                for i in 0..iters {
                    source.set(document(i as i64));
                    config.reload().await.unwrap();
                }
                let duration = start.elapsed();

                running.store(false, Ordering::Relaxed);
                for reader in readers {
                    reader.await.unwrap();
                }

                println!(
                    "  Completed {} reads during {} reloads",
                    reads.load(Ordering::Relaxed),
                    iters
                );
                duration
            })
        });
    });

    group.finish();
}

/// Benchmark comparison with lock-based caches
fn benchmark_lock_comparison(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let (config, _source) = provider(&runtime);
    let mut group = c.benchmark_group("lock_comparison");

    group.bench_function("provider_read", |b| {
        b.iter(|| {
            black_box(config.get().value);
        });
    });

    let mutex = std::sync::Mutex::new(config.get());
    group.bench_function("mutex_arc_read", |b| {
        b.iter(|| {
            let cfg = mutex.lock().unwrap();
            black_box(cfg.value);
        });
    });

    let rwlock = parking_lot::RwLock::new(config.get());
    group.bench_function("rwlock_read", |b| {
        b.iter(|| {
            let cfg = rwlock.read();
            black_box(cfg.value);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_read_latency,
    benchmark_concurrent_reads,
    benchmark_reload_under_load,
    benchmark_lock_comparison,
);

criterion_main!(benches);
