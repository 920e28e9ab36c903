//! # Model Architectures
//!
//! - `unet`: the plain [`UNet`] encoder/decoder.
//! - `efficient_unet`: [`EfficientUNet`], a decoder over an EfficientNet encoder.
//! - `depthnet`: [`DepthNet`], a configuration driven wrapper over both.
//! - `modules`: convolution and decoder building blocks.

pub mod depthnet;
pub mod efficient_unet;
pub mod modules;
pub mod unet;

pub use depthnet::*;
pub use efficient_unet::*;
pub use unet::*;
