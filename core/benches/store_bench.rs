// Block cache benchmarks.
//
// Covers the read path (snapshot load and JSON serialization, which is what
// every GET /blocks pays) and the two ways a window is rebuilt: a full walk
// and an extension of the previous window.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;

use blockwindow_core::{Block, BlockHash, CacheStore, ChainWindow, SnapshotOrigin};

fn hash(n: u32) -> BlockHash {
    let mut bytes = [0xB1u8; 32];
    bytes[28..].copy_from_slice(&n.to_be_bytes());
    BlockHash::parse(hex::encode(bytes)).unwrap()
}

/// Block at height `n` with a realistic handful of passthrough fields.
fn block(n: u32) -> Block {
    let prev = n.checked_sub(1).map(hash);
    Block::new(hash(n), prev)
        .with_field("height", json!(n))
        .with_field("confirmations", json!(1))
        .with_field("time", json!(1_700_000_000 + n as u64 * 600))
        .with_field("tx", json!([format!("{:064x}", n)]))
}

/// Newest-first window of blocks `tip - len + 1 ..= tip`.
fn window(tip: u32, len: u32) -> ChainWindow {
    let blocks = (tip + 1 - len..=tip).rev().map(block).collect();
    ChainWindow::from_newest_first(blocks).unwrap()
}

fn bench_read_current(c: &mut Criterion) {
    let mut store = CacheStore::new();
    store.replace(window(1_000, 200), SnapshotOrigin::Rebuilt);
    let reader = store.reader();

    c.bench_function("store/read_current", |b| {
        b.iter(|| reader.read_current().unwrap());
    });
}

fn bench_serialize_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("store/serialize_oldest_first");

    for size in [10u32, 200, 1_000] {
        let mut store = CacheStore::new();
        store.replace(window(5_000, size), SnapshotOrigin::Rebuilt);
        let reader = store.reader();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &reader, |b, reader| {
            b.iter(|| {
                let snapshot = reader.read_current().unwrap();
                serde_json::to_vec(&snapshot.oldest_first()).unwrap()
            });
        });
    }

    group.finish();
}

fn bench_window_extend(c: &mut Criterion) {
    let previous = window(1_000, 200);
    let newer: Vec<Block> = (1_001..=1_003).rev().map(block).collect();

    c.bench_function("window/extend_by_3", |b| {
        b.iter(|| previous.extend(newer.clone(), 200).unwrap());
    });

    c.bench_function("window/validate_200", |b| {
        let blocks: Vec<Block> = (801..=1_000).rev().map(block).collect();
        b.iter(|| ChainWindow::from_newest_first(blocks.clone()).unwrap());
    });
}

criterion_group!(
    benches,
    bench_read_current,
    bench_serialize_snapshot,
    bench_window_extend,
);
criterion_main!(benches);
