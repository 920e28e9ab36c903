//! Predict depth maps with a DepthNet model.
//!
//! Each prediction is written as a 16-bit grayscale PNG, min-max normalized
//! per image.
//!
//! ## Usage
//!
//! ```bash
//! # Single image with weights produced by `convert`
//! cargo run --bin predict -- image.jpg --weights models/depthnet.mpk
//!
//! # Directory of images with an explicit model configuration
//! cargo run --bin predict -- images/ --model-config models/depthnet.json --output outputs/
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
};
use clap::Parser;
use depthnet::{normalize_imagenet, DepthNet, DepthNetConfig};
use depthnet_demos::{
    collect_images, create_device, get_backend_name, init_tracing, ImageUtils, PredictConfig,
    SelectedBackend, SelectedDevice,
};
use image::{imageops::FilterType, DynamicImage};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input image or directory
    input: PathBuf,

    /// Output directory for depth maps
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Burn record (`.mpk`) to load
    #[arg(short, long)]
    weights: Option<PathBuf>,

    /// Model configuration (JSON written by `DepthNetConfig::save`)
    #[arg(long)]
    model_config: Option<PathBuf>,

    /// Apply ImageNet mean/std normalization to RGB input
    #[arg(long)]
    imagenet_normalization: bool,

    /// Keep depth maps at the model's output resolution
    #[arg(long)]
    model_resolution: bool,

    /// Run configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = if let Some(config_path) = &args.config {
        let config_str = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
        serde_json::from_str::<PredictConfig>(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?
    } else {
        PredictConfig::default()
    };

    // Apply command line overrides
    if let Some(path) = &args.model_config {
        config.model = DepthNetConfig::load(path)
            .with_context(|| format!("Failed to load model config: {}", path.display()))?;
    }
    if let Some(output) = args.output {
        config.output_path = output;
    }
    if args.weights.is_some() {
        config.weights = args.weights;
    }
    config.imagenet_normalization |= args.imagenet_normalization;
    if args.model_resolution {
        config.preserve_original_resolution = false;
    }

    if !args.input.exists() {
        anyhow::bail!("Input path does not exist: {}", args.input.display());
    }
    let images = collect_images(&args.input)?;
    if images.is_empty() {
        anyhow::bail!("No images found in: {}", args.input.display());
    }

    fs::create_dir_all(&config.output_path).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            config.output_path.display()
        )
    })?;

    let device = create_device();
    tracing::info!(backend = %get_backend_name(), "Using backend");

    let model = load_model(&config, &device)?;

    for image_path in &images {
        let start = Instant::now();
        let output_path = predict_image(&model, image_path, &config, &device)?;
        tracing::info!(
            input = %image_path.display(),
            output = %output_path.display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Wrote depth map"
        );
    }

    tracing::info!(count = images.len(), "Prediction completed");
    Ok(())
}

fn load_model(config: &PredictConfig, device: &SelectedDevice) -> Result<DepthNet<SelectedBackend>> {
    let model = config
        .model
        .init::<SelectedBackend>(device)
        .context("Failed to build model")?;

    match &config.weights {
        Some(path) => {
            let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
            let model = model
                .load_file(path, &recorder, device)
                .with_context(|| format!("Failed to load weights: {}", path.display()))?;
            tracing::info!(path = %path.display(), "Loaded weights");
            Ok(model)
        }
        None => {
            tracing::warn!("No weights given, predicting with randomly initialized parameters");
            Ok(model)
        }
    }
}

fn predict_image(
    model: &DepthNet<SelectedBackend>,
    image_path: &Path,
    config: &PredictConfig,
    device: &SelectedDevice,
) -> Result<PathBuf> {
    let input_shape = model.input_shape();
    let (mut x, (width, height)) =
        ImageUtils::load_image::<SelectedBackend, _>(image_path, &input_shape, device)?;

    if config.imagenet_normalization && input_shape.channels == 3 {
        x = normalize_imagenet(x);
    }

    let depth = model
        .forward(x)
        .with_context(|| format!("Prediction failed for {}", image_path.display()))?;
    let mut depth_image = ImageUtils::depth_to_image(depth)?;

    if config.preserve_original_resolution {
        depth_image = DynamicImage::ImageLuma16(image::imageops::resize(
            &depth_image.into_luma16(),
            width,
            height,
            FilterType::Triangle,
        ));
    }

    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "depth".to_string());
    let output_path = config.output_path.join(format!("{stem}.png"));

    depth_image
        .save(&output_path)
        .with_context(|| format!("Failed to save depth map: {}", output_path.display()))?;

    Ok(output_path)
}
