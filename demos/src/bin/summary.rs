//! Print a DepthNet model's structure, parameter count and output shape.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin summary -- unet --height 256 --width 256 --channels 1
//! cargo run --bin summary -- efficient-unet --height 480 --width 640 --variant b3
//! ```

use anyhow::{Context, Result};
use burn::prelude::*;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use depthnet::{Architecture, DepthNet, DepthNetConfig, EfficientNetVariant, InputShape};
use depthnet_demos::{create_device, get_backend_name, init_tracing, SelectedBackend};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Print the full module tree
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// U-Net trained from scratch
    Unet(Shape),
    /// U-Net decoder over an EfficientNet encoder
    EfficientUnet {
        #[command(flatten)]
        shape: Shape,

        /// Encoder variant
        #[arg(long, value_enum, default_value = "b0")]
        variant: Variant,
    },
}

#[derive(ClapArgs, Debug)]
struct Shape {
    /// Input height in pixels
    #[arg(long, default_value = "256")]
    height: usize,

    /// Input width in pixels
    #[arg(long, default_value = "256")]
    width: usize,

    /// Input channels
    #[arg(long, default_value = "3")]
    channels: usize,
}

impl Shape {
    fn input(&self) -> InputShape {
        InputShape::new(self.height, self.width).with_channels(self.channels)
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Variant {
    B0,
    B1,
    B2,
    B3,
    B4,
    B5,
    B6,
    B7,
}

impl From<Variant> for EfficientNetVariant {
    fn from(variant: Variant) -> Self {
        match variant {
            Variant::B0 => Self::B0,
            Variant::B1 => Self::B1,
            Variant::B2 => Self::B2,
            Variant::B3 => Self::B3,
            Variant::B4 => Self::B4,
            Variant::B5 => Self::B5,
            Variant::B6 => Self::B6,
            Variant::B7 => Self::B7,
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.command {
        Command::Unet(shape) => DepthNetConfig::new(shape.input()),
        Command::EfficientUnet { shape, variant } => DepthNetConfig::new(shape.input())
            .with_architecture(Architecture::EfficientUNet((*variant).into())),
    };

    let device = create_device();
    tracing::info!(backend = %get_backend_name(), "Using backend");

    let model: DepthNet<SelectedBackend> = config
        .init(&device)
        .context("Failed to build model")?;

    if cli.verbose {
        match &model {
            DepthNet::UNet(inner) => println!("{inner}"),
            DepthNet::EfficientUNet(inner) => println!("{inner}"),
        }
    }

    let input = &config.input;
    let x = Tensor::<SelectedBackend, 4>::zeros([1, input.channels, input.height, input.width], &device);
    let output = model.forward(x).context("Forward pass failed")?;

    println!("Architecture: {:?}", config.architecture);
    println!(
        "Input:        [batch, {}, {}, {}]",
        input.channels, input.height, input.width
    );
    println!("Output:       {:?}", output.dims());
    println!("Parameters:   {}", model.num_params());

    Ok(())
}
