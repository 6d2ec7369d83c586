//! Synthetic model and dataset files for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use candle_core::{Device, Tensor};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Reference layer shapes as `(tensor name, rows, cols)`.
pub const LAYERS: [(&str, usize, usize); 3] = [
    ("fc1.weight", 256, 784),
    ("fc2.weight", 128, 256),
    ("fc3.weight", 10, 128),
];

/// Write a seeded random model in the reference geometry.
pub fn write_model(dir: &Path, seed: u64) -> PathBuf {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let device = Device::Cpu;
    let tensors: HashMap<String, Tensor> = LAYERS
        .iter()
        .map(|&(name, rows, cols)| {
            let values: Vec<f32> = (0..rows * cols)
                .map(|_| rng.gen_range(-0.1f32..0.1))
                .collect();
            (
                name.to_string(),
                Tensor::from_vec(values, (rows, cols), &device).unwrap(),
            )
        })
        .collect();

    let path = dir.join("model.safetensors");
    candle_core::safetensors::save(&tensors, &path).unwrap();
    path
}

/// Write a model whose weights are all zero.
pub fn write_zero_model(dir: &Path) -> PathBuf {
    let device = Device::Cpu;
    let tensors: HashMap<String, Tensor> = LAYERS
        .iter()
        .map(|&(name, rows, cols)| {
            (
                name.to_string(),
                Tensor::zeros((rows, cols), candle_core::DType::F32, &device).unwrap(),
            )
        })
        .collect();

    let path = dir.join("zero_model.safetensors");
    candle_core::safetensors::save(&tensors, &path).unwrap();
    path
}

/// Write `count` seeded random images in [0, 1] with labels 0..10.
pub fn write_dataset(dir: &Path, count: usize, seed: u64) -> PathBuf {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let device = Device::Cpu;
    let images: Vec<f32> = (0..count * 784).map(|_| rng.gen::<f32>()).collect();
    let labels: Vec<u32> = (0..count).map(|_| rng.gen_range(0..10)).collect();

    let mut tensors = HashMap::new();
    tensors.insert(
        "images".to_string(),
        Tensor::from_vec(images, (count, 784), &device).unwrap(),
    );
    tensors.insert(
        "labels".to_string(),
        Tensor::from_vec(labels, count, &device).unwrap(),
    );

    let path = dir.join("mnist_test.safetensors");
    candle_core::safetensors::save(&tensors, &path).unwrap();
    path
}
