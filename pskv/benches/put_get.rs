use std::hint::black_box;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use pskv::{HashTableFile, Options};
use tempfile::tempdir;

/// Keys and values of the shape a small metadata store would hold.
fn generate_data(size: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
    (0..size)
        .map(|i| {
            let key = format!("user:{i:08}").into_bytes();
            let value = format!("{{\"id\":{i},\"name\":\"user {i}\"}}").into_bytes();
            (key, value)
        })
        .collect()
}

fn benchmark_put_get(c: &mut Criterion) {
    for &size in &[10_000, 100_000] {
        let mut group = c.benchmark_group(format!("pskv_size={size}"));
        if size >= 100_000 {
            group.sample_size(10);
            group.measurement_time(Duration::from_secs(30));
        }
        let data = generate_data(size);

        group.bench_function("put - growing from 64 pages", |b| {
            b.iter_batched(
                || {
                    let dir = tempdir().unwrap();
                    let table =
                        HashTableFile::create(dir.path().join("bench.pskv"), &Options::default())
                            .unwrap();
                    (dir, table)
                },
                |(dir, table)| {
                    for (k, v) in &data {
                        table.put(k, v).unwrap();
                    }
                    (dir, table)
                },
                BatchSize::PerIteration,
            );
        });

        let dir = tempdir().unwrap();
        let table =
            HashTableFile::create(dir.path().join("bench.pskv"), &Options::default()).unwrap();
        for (k, v) in &data {
            table.put(k, v).unwrap();
        }

        group.bench_function("get - hit", |b| {
            b.iter(|| {
                for (k, _) in &data {
                    black_box(table.get(k).unwrap());
                }
            })
        });

        group.bench_function("put - replace", |b| {
            b.iter(|| {
                for (k, v) in &data {
                    black_box(table.put(k, v).unwrap());
                }
            })
        });

        group.finish();
    }
}

criterion_group!(benches, benchmark_put_get);
criterion_main!(benches);
