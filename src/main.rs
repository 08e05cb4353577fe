mod fixed;

mod layer;

mod model;

mod ops;

mod pipeline;

mod tensor;

mod utils;

mod weights;

use std::env;
use std::path::Path;
use std::process::ExitCode;

use image::imageops::FilterType;
use rand::{Rng, SeedableRng, rngs::StdRng};

use fixed::Fixed;
use model::squeezenet_v10;
use pipeline::{Pipeline, PipelineConfig, print_pipeline_stats};
use tensor::{ClassScores, Tensor, TensorDesc};
use utils::error::FxnnError;
use weights::WeightStore;

const CIFAR10_CLASSES: [&str; 10] = [
    "airplane",
    "automobile",
    "bird",
    "cat",
    "deer",
    "dog",
    "frog",
    "horse",
    "ship",
    "truck",
];

// channel statistics the weight export was trained with
const CIFAR10_MEAN: [f32; 3] = [0.4914, 0.4822, 0.4465];
const CIFAR10_STD: [f32; 3] = [0.2023, 0.1994, 0.2010];

const INPUT_SIDE: usize = 224;
const RANDOM_WEIGHT_SEED: u64 = 727;
const RANDOM_INPUT_SEED: u64 = 728;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let image_path = args.get(1).map(String::as_str);
    let weights_dir = args.get(2).map(String::as_str);

    match run(image_path, weights_dir) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(image_path: Option<&str>, weights_dir: Option<&str>) -> Result<(), FxnnError> {
    let table = squeezenet_v10(INPUT_SIDE, INPUT_SIDE)?;

    let store = match weights_dir {
        Some(dir) => {
            println!("Loading weights from {dir}...");
            WeightStore::load_dir(&table, Path::new(dir))?
        }
        None => {
            println!("No weights directory given, using seeded random weights.");
            WeightStore::random_for(&table, RANDOM_WEIGHT_SEED)?
        }
    };

    let input = match image_path {
        Some(path) => {
            println!("Loading {path}...");
            load_image(path)?
        }
        None => {
            println!("No image given, using a seeded random input.");
            random_input()
        }
    };

    let mut pipeline = Pipeline::new(table, store, PipelineConfig::default())?;
    println!(
        "\nExecuting all {} layers sequentially...",
        pipeline.descriptors().len()
    );
    let scores = pipeline.run(&input)?;

    print_pipeline_stats(&pipeline);
    print_scores(&scores);
    Ok(())
}

/// Decodes a PNG, resizes to the network input and quantizes the normalized
/// channels into Q6.10 CHW.
fn load_image(path: &str) -> Result<Tensor, FxnnError> {
    let side = INPUT_SIDE as u32;
    let image = image::open(path)?
        .resize_exact(side, side, FilterType::Triangle)
        .to_rgb8();

    let mut tensor = Tensor::zeros(TensorDesc::new(3, INPUT_SIDE, INPUT_SIDE));
    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..3 {
            let v = pixel.0[c] as f32 / 255.0;
            let normalized = (v - CIFAR10_MEAN[c]) / CIFAR10_STD[c];
            tensor.set(c, y as usize, x as usize, Fixed::from_f32(normalized));
        }
    }
    Ok(tensor)
}

/// Uniform noise pushed through the same normalization as a decoded image.
fn random_input() -> Tensor {
    let mut rng = StdRng::seed_from_u64(RANDOM_INPUT_SEED);
    let mut tensor = Tensor::zeros(TensorDesc::new(3, INPUT_SIDE, INPUT_SIDE));
    for c in 0..3 {
        for h in 0..INPUT_SIDE {
            for w in 0..INPUT_SIDE {
                let v: f32 = rng.random_range(0.0..1.0);
                let normalized = (v - CIFAR10_MEAN[c]) / CIFAR10_STD[c];
                tensor.set(c, h, w, Fixed::from_f32(normalized));
            }
        }
    }
    tensor
}

fn print_scores(scores: &ClassScores) {
    println!("\n{:=<70}", "");
    println!("  SqueezeNet Output (Class Scores)");
    println!("{:=<70}", "");
    for (i, (&score, label)) in scores.as_slice().iter().zip(CIFAR10_CLASSES).enumerate() {
        println!("  Class {i} ({label:<10}): {:.4}", score.to_f32());
    }
    println!("{:-<70}", "");
    let best = scores.argmax();
    println!(
        "  Predicted: {} (score: {:.4})",
        CIFAR10_CLASSES[best],
        scores.as_slice()[best].to_f32()
    );
    println!("{:=<70}", "");
}
