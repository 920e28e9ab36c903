//! # DepthNet-Burn
//!
//! Dense single-channel regression networks (depth or height maps) built with
//! [Burn](https://burn.dev):
//!
//! - [`build_model`]: a U-Net trained from scratch.
//! - [`build_efficientnet_model`]: a U-Net decoder over an EfficientNet-B0 encoder.
//!
//! Both take the input height, width and channel count and return a module whose
//! `forward` maps `[batch, channels, height, width]` to `[batch, 1, height, width]`.
//!
//! ```no_run
//! use burn::backend::NdArray;
//! use depthnet::build_model;
//!
//! let device = Default::default();
//! let model = build_model::<NdArray>(256, 256, 3, &device)?;
//! # Ok::<(), depthnet::DepthNetError>(())
//! ```

mod config;
mod error;
mod models;
#[cfg(feature = "pretrained")]
pub mod pretrained;

use burn::prelude::*;

pub use config::{Architecture, InputShape};
pub use error::{DepthNetError, DepthNetResult};
pub use models::{
    modules::{ConvBlock, ConvBlockConfig, DecoderBlock, DecoderBlockConfig},
    DepthNet, DepthNetConfig, DepthNetRecord, EfficientUNet, EfficientUNetConfig,
    EfficientUNetRecord, UNet, UNetConfig, UNetRecord,
};

pub use backbones::{normalize_imagenet, BackboneType, EfficientNetVariant, IMAGENET_MEAN, IMAGENET_STD};

/// Build the U-Net for `input_height x input_width` images with `num_channels` channels.
///
/// Four 2x2 poolings take the input down to 1/16 before the 1024 channel
/// bottleneck, so both sides must be multiples of 16.
///
/// # Errors
///
/// Returns an error if a dimension is zero or not divisible by 16.
pub fn build_model<B: Backend>(
    input_height: usize,
    input_width: usize,
    num_channels: usize,
    device: &Device<B>,
) -> DepthNetResult<UNet<B>> {
    let input = InputShape::new(input_height, input_width).with_channels(num_channels);
    let model = UNetConfig::new(input).init(device)?;

    tracing::info!(
        height = input_height,
        width = input_width,
        channels = num_channels,
        "Built U-Net"
    );

    Ok(model)
}

/// Build the EfficientNet-B0 U-Net for `input_height x input_width` images with
/// `num_channels` channels.
///
/// The encoder is randomly initialized; see `pretrained` (feature `pretrained`)
/// for ImageNet weights. Both sides must be multiples of 32.
///
/// # Errors
///
/// Returns an error if a dimension is zero or not divisible by 32.
pub fn build_efficientnet_model<B: Backend>(
    input_height: usize,
    input_width: usize,
    num_channels: usize,
    device: &Device<B>,
) -> DepthNetResult<EfficientUNet<B>> {
    let input = InputShape::new(input_height, input_width).with_channels(num_channels);
    let model = EfficientUNetConfig::new(input).init(device)?;

    tracing::info!(
        height = input_height,
        width = input_width,
        channels = num_channels,
        "Built EfficientNet U-Net"
    );

    Ok(model)
}
