//! Benchmarks for quantization, the integer engine and shift calibration.

use bitnet_fixedpoint::{engine, quantize_tensor, CalibrationDataset, ShiftCalibrator, TernaryMlp};
use candle_core::Device;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn reference_mlp() -> TernaryMlp {
    let device = Device::Cpu;
    let layer = |rows: usize, cols: usize| {
        let w = candle_core::Tensor::randn(0.0f32, 1.0, (rows, cols), &device).unwrap();
        quantize_tensor(&w).unwrap()
    };
    TernaryMlp::new([layer(256, 784), layer(128, 256), layer(10, 128)]).unwrap()
}

fn samples(count: usize) -> CalibrationDataset {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let samples = (0..count)
        .map(|_| (0..784).map(|_| rng.gen_range(0i32..=127) as i8).collect())
        .collect();
    CalibrationDataset::new(samples).unwrap()
}

fn bench_weight_quantization(c: &mut Criterion) {
    let mut group = c.benchmark_group("weight_quantization");
    let device = Device::Cpu;

    for (rows, cols) in [(10, 128), (128, 256), (256, 784)].iter() {
        let weight = candle_core::Tensor::randn(0.0f32, 1.0, (*rows, *cols), &device).unwrap();
        let label = format!("{rows}x{cols}");
        group.bench_with_input(BenchmarkId::new("quantize", &label), &(), |bench, _| {
            bench.iter(|| black_box(quantize_tensor(&weight).unwrap()))
        });
    }

    group.finish();
}

fn bench_forward(c: &mut Criterion) {
    let mut calibrated = reference_mlp();
    let data = samples(16);
    ShiftCalibrator::new().calibrate(&mut calibrated, &data).unwrap();
    let input = data.samples()[0].clone();

    c.bench_function("forward_784_256_128_10", |bench| {
        bench.iter(|| black_box(engine::predict(&calibrated, &input)))
    });
}

fn bench_calibration(c: &mut Criterion) {
    let mut group = c.benchmark_group("calibration");
    group.sample_size(10);
    let mlp = reference_mlp();
    let data = samples(64);

    for parallel in [false, true] {
        let label = if parallel { "parallel" } else { "sequential" };
        group.bench_with_input(BenchmarkId::new("calibrate", label), &parallel, |bench, &p| {
            bench.iter(|| {
                let mut mlp = mlp.clone();
                black_box(
                    ShiftCalibrator::new()
                        .with_parallel(p)
                        .calibrate(&mut mlp, &data)
                        .unwrap(),
                )
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_weight_quantization,
    bench_forward,
    bench_calibration
);
criterion_main!(benches);
