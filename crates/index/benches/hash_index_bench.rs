//! Benchmarks for carestore-index using criterion.

use carestore_index::{HashIndex, Index};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn hash_insert_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_insert");

    for size in [100u64, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut index: HashIndex<u64> = HashIndex::new(false);
                for i in 0..size {
                    // ~10 dependents per parent
                    index.add(i / 10, i).unwrap();
                }
                black_box(index)
            });
        });
    }

    group.finish();
}

fn hash_fan_out_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_fan_out");

    for fan_out in [1u64, 10, 100].iter() {
        let mut index: HashIndex<u64> = HashIndex::new(false);
        for parent in 0..1000u64 {
            for child in 0..*fan_out {
                index.add(parent, parent * fan_out + child).unwrap();
            }
        }

        group.bench_with_input(BenchmarkId::from_parameter(fan_out), fan_out, |b, _| {
            b.iter(|| {
                for parent in (0..1000u64).step_by(10) {
                    black_box(index.get(&parent));
                }
            });
        });
    }

    group.finish();
}

fn hash_unique_lookup_benchmark(c: &mut Criterion) {
    let mut index: HashIndex<(u64, u64)> = HashIndex::new(true);
    for d in 0..100u64 {
        for f in 0..100u64 {
            index.add((d, f), d * 100 + f).unwrap();
        }
    }

    c.bench_function("hash_unique_lookup", |b| {
        b.iter(|| {
            for i in 0..100u64 {
                black_box(index.contains_key(&(i, 99 - i)));
            }
        });
    });
}

criterion_group!(
    benches,
    hash_insert_benchmark,
    hash_fan_out_benchmark,
    hash_unique_lookup_benchmark
);
criterion_main!(benches);
