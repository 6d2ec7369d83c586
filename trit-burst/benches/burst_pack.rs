//! Benchmarks for burst packing.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trit_burst::PackedBlock;

fn weights(rows: usize, cols: usize) -> Vec<i8> {
    (0..rows * cols)
        .map(|i| match i % 5 {
            0 | 1 => 1,
            2 | 3 => -1,
            _ => 0,
        })
        .collect()
}

fn bench_pack(c: &mut Criterion) {
    let mut group = c.benchmark_group("burst_pack");

    for (rows, cols) in [(10, 128), (128, 256), (256, 784)].iter() {
        let values = weights(*rows, *cols);
        let label = format!("{rows}x{cols}");
        group.bench_with_input(BenchmarkId::new("pack", &label), &(), |bench, _| {
            bench.iter(|| black_box(PackedBlock::pack(&values, *rows, *cols).unwrap()))
        });
    }

    group.finish();
}

fn bench_unpack(c: &mut Criterion) {
    let mut group = c.benchmark_group("burst_unpack");

    for (rows, cols) in [(10, 128), (128, 256), (256, 784)].iter() {
        let block = PackedBlock::pack(&weights(*rows, *cols), *rows, *cols).unwrap();
        let label = format!("{rows}x{cols}");
        group.bench_with_input(BenchmarkId::new("unpack", &label), &(), |bench, _| {
            bench.iter(|| black_box(block.unpack().unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pack, bench_unpack);
criterion_main!(benches);
