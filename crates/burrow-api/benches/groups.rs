//! Group index benchmarks.

use burrow::{Config, Store};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::TempDir;

/// Benchmark adding members to a group.
fn bench_add_to_group(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_to_group");

    for size in [64usize, 1024, 4096] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("in_memory", size), &size, |b, &size| {
            let store = Store::in_memory().unwrap();
            let value = vec![0xabu8; size];
            let mut n = 0u64;

            b.iter(|| {
                n += 1;
                store
                    .add_to_group("bench", &n.to_string(), black_box(&value))
                    .unwrap();
            });
        });

        group.bench_with_input(BenchmarkId::new("persistent", size), &size, |b, &size| {
            let temp_dir = TempDir::new().unwrap();
            let config = Config::new(temp_dir.path())
                .without_maintenance()
                .with_sync_mode(burrow::SyncMode::None);
            let store = Store::open(config).unwrap();
            let value = vec![0xabu8; size];
            let mut n = 0u64;

            b.iter(|| {
                n += 1;
                store
                    .add_to_group("bench", &n.to_string(), black_box(&value))
                    .unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark listing a whole group.
fn bench_get_group(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_group");

    for members in [10usize, 100, 1000] {
        group.throughput(Throughput::Elements(members as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(members),
            &members,
            |b, &members| {
                let store = Store::in_memory().unwrap();
                for i in 0..members {
                    store.add_to_group("bench", &i.to_string(), &[1u8; 256]).unwrap();
                    // Neighbouring group that must not be scanned
                    store.add_to_group("bench2", &i.to_string(), &[2u8; 256]).unwrap();
                }

                b.iter(|| {
                    let result = store.get_group(black_box("bench"), 128).unwrap();
                    assert_eq!(result.len(), members);
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_add_to_group, bench_get_group);
criterion_main!(benches);
