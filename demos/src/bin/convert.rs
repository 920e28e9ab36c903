//! Build an EfficientNet U-Net with ImageNet encoder weights and save it as a
//! Burn record.
//!
//! The encoder weights come from a torchvision checkpoint
//! (`efficientnet_bN_*.pth`). Without `--input` the torch hub cache is searched.
//! The model configuration is written next to the record as JSON so `predict`
//! can rebuild the same network.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin convert -- --input efficientnet_b0_rwightman-7f5810bc.pth \
//!     --output models/depthnet.mpk --height 480 --width 640
//! ```

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
};
use clap::Parser;
use depthnet::{pretrained, Architecture, DepthNet, InputShape};
use depthnet_demos::{create_device, get_backend_name, init_tracing, ConvertConfig, SelectedBackend};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// torchvision EfficientNet checkpoint (.pth)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output record path (.mpk)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Input height in pixels
    #[arg(long)]
    height: Option<usize>,

    /// Input width in pixels
    #[arg(long)]
    width: Option<usize>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = if let Some(config_path) = &args.config {
        let config_str = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
        serde_json::from_str::<ConvertConfig>(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?
    } else {
        ConvertConfig::default()
    };

    // Apply command line overrides
    if args.input.is_some() {
        config.input_path = args.input;
    }
    if let Some(output) = args.output {
        config.output_path = output;
    }
    let [height, width, channels] = config.model.input.as_array();
    config.model.input = InputShape::new(
        args.height.unwrap_or(height),
        args.width.unwrap_or(width),
    )
    .with_channels(channels);

    let variant = match &config.model.architecture {
        Architecture::EfficientUNet(variant) => variant.clone(),
        Architecture::UNet => {
            anyhow::bail!("Only the EfficientNet U-Net has pretrained encoder weights")
        }
    };

    let checkpoint = match &config.input_path {
        Some(path) => path.clone(),
        None => pretrained::default_checkpoint_path(&variant)
            .context("No checkpoint given and none found in the torch hub cache")?,
    };

    let device = create_device();
    tracing::info!(backend = %get_backend_name(), "Using backend");

    let model = match config.model.init::<SelectedBackend>(&device)? {
        DepthNet::EfficientUNet(model) => {
            DepthNet::EfficientUNet(model.with_pretrained_backbone(&checkpoint, &device)?)
        }
        DepthNet::UNet(_) => anyhow::bail!("Expected an EfficientNet U-Net"),
    };
    tracing::info!(
        variant = ?variant,
        checkpoint = %checkpoint.display(),
        "Loaded encoder weights"
    );

    if let Some(parent) = config.output_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    model
        .save_file(&config.output_path, &recorder)
        .with_context(|| format!("Failed to save record: {}", config.output_path.display()))?;

    let config_path = config.output_path.with_extension("json");
    config
        .model
        .save(&config_path)
        .with_context(|| format!("Failed to save model config: {}", config_path.display()))?;

    tracing::info!(
        record = %config.output_path.with_extension("mpk").display(),
        config = %config_path.display(),
        "Conversion completed"
    );
    Ok(())
}

