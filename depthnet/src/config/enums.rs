//! Enumeration types for DepthNet configuration.

use backbones::EfficientNetVariant;
use burn::prelude::*;

/// Selects which network a [`DepthNetConfig`](crate::DepthNetConfig) builds.
#[derive(Config, Debug, PartialEq)]
pub enum Architecture {
    /// Plain U-Net trained from scratch.
    UNet,
    /// U-Net decoder on top of an EfficientNet encoder.
    EfficientUNet(EfficientNetVariant),
}

impl Architecture {
    /// Factor both spatial input dimensions must be divisible by.
    pub const fn required_multiple(&self) -> usize {
        match self {
            Self::UNet => 16,
            Self::EfficientUNet(_) => 32,
        }
    }
}
