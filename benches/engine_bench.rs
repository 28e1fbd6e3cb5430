//! TESSERA - Performance Benchmarks
//! Measures throughput of core engine operations using Criterion.

use std::io;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tessera::config::Config;
use tessera::engine::memtable::MemTable;
use tessera::engine::Tessera;

fn key(i: usize) -> Vec<u8> {
    format!("key_{:06}", i).into_bytes()
}

fn value(i: usize) -> Vec<u8> {
    format!("value_{:06}", i).into_bytes()
}

fn filled_memtable(n: usize) -> MemTable {
    let mut table = MemTable::with_seed(0);
    for i in 0..n {
        table.put(key(i), value(i));
    }
    table
}

fn bench_memtable_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("memtable");

    group.bench_function("insert_1000", |b| {
        b.iter(|| {
            let mut table = MemTable::with_seed(0);
            for i in 0..1000 {
                table.put(black_box(key(i)), black_box(value(i)));
            }
        });
    });

    group.bench_function("get_hit", |b| {
        let table = filled_memtable(1000);
        b.iter(|| black_box(table.get(b"key_000500")));
    });

    group.bench_function("get_miss", |b| {
        let table = filled_memtable(1000);
        b.iter(|| black_box(table.get(b"nonexistent_key")));
    });

    group.bench_function("range_100", |b| {
        let table = filled_memtable(1000);
        b.iter(|| black_box(table.range(b"key_000400", b"key_000500").count()));
    });

    group.bench_function("delete_1000", |b| {
        b.iter(|| {
            let mut table = filled_memtable(1000);
            for i in 0..1000 {
                black_box(table.delete(&key(i)));
            }
        });
    });

    group.bench_function("flush_to_sink_1000", |b| {
        let table = filled_memtable(1000);
        b.iter(|| table.flush_to_table(io::sink(), 2048).unwrap());
    });

    group.finish();
}

fn bench_engine_e2e(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_e2e");

    for size in [100, 500, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("put_get_cycle", size), size, |b, &size| {
            b.iter(|| {
                let dir = tempfile::tempdir().unwrap();
                let config = Config::new(dir.path())
                    .with_memtable_max_size(16 * 1024)
                    .with_sync_writes(false);
                let mut engine = Tessera::open(config).unwrap();

                for i in 0..size {
                    engine.put(key(i), value(i)).unwrap();
                }
                for i in 0..size {
                    black_box(engine.get(&key(i)).unwrap());
                }
            });
        });
    }

    group.finish();
}

fn bench_engine_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_reads");

    let dir = tempfile::tempdir().unwrap();
    let config = Config::new(dir.path())
        .with_memtable_max_size(32 * 1024)
        .with_sync_writes(false);
    let mut engine = Tessera::open(config).unwrap();
    for i in 0..10_000 {
        engine.put(key(i), value(i)).unwrap();
    }

    group.bench_function("get_from_tables", |b| {
        b.iter(|| black_box(engine.get(b"key_000123").unwrap()));
    });

    group.bench_function("get_miss", |b| {
        b.iter(|| black_box(engine.get(b"missing").is_err()));
    });

    group.bench_function("range_scan_1000", |b| {
        b.iter(|| {
            let n = engine
                .range_scan(b"key_004000", b"key_005000")
                .unwrap()
                .count();
            black_box(n)
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_memtable_operations,
    bench_engine_e2e,
    bench_engine_reads
);
criterion_main!(benches);
