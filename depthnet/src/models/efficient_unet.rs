//! # EfficientNet U-Net
//!
//! A U-Net style decoder attached to an EfficientNet encoder. The decoder walks
//! back up the five encoder taps; each stage upsamples x2, concatenates the
//! matching tap and applies a single 3x3 convolution with ReLU.
//!
//! The deepest decoder stage sits at half the input resolution. With
//! `restore_input_resolution` the single-channel prediction is upsampled once
//! more so the output matches the input size.

use backbones::{create_backbone, Backbone, BackboneType, BackboneWrapper, EfficientNetVariant};
use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        Initializer,
    },
    prelude::*,
};
use burn_extra_ops::{UpsampleNearest, UpsampleNearestConfig};

use super::modules::{DecoderBlock, DecoderBlockConfig};
use crate::{
    config::InputShape,
    error::{DepthNetError, DepthNetResult},
};

/// Configuration for the [`EfficientUNet`] model.
#[derive(Config, Debug)]
pub struct EfficientUNetConfig {
    /// Declared input size.
    pub input: InputShape,
    /// Encoder network.
    #[config(default = "BackboneType::EfficientNet(EfficientNetVariant::B0)")]
    pub backbone: BackboneType,
    /// Output channels of the four decoder stages, deepest first.
    #[config(default = "[256, 128, 64, 32]")]
    pub decoder_channels: [usize; 4],
    /// Upsample the prediction back to the input resolution.
    #[config(default = "true")]
    pub restore_input_resolution: bool,
}

impl EfficientUNetConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Err(DepthNetError::InvalidConfiguration)` for zero-width decoder stages.
    /// Returns `Err(DepthNetError::IncompatibleSpatialSize)` if the input is not
    /// divisible by the encoder's total stride.
    pub fn validate(&self) -> DepthNetResult<()> {
        if self.decoder_channels.contains(&0) {
            return Err(DepthNetError::InvalidConfiguration {
                reason: format!(
                    "decoder_channels must be non-zero, got {:?}",
                    self.decoder_channels
                ),
            });
        }
        self.input.validate(self.backbone.reduction())
    }

    /// Spatial size of the prediction produced for the declared input.
    pub const fn output_size(&self) -> [usize; 2] {
        if self.restore_input_resolution {
            [self.input.height, self.input.width]
        } else {
            [self.input.height / 2, self.input.width / 2]
        }
    }

    /// Initializes an `EfficientUNet` model with a randomly initialized encoder.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> DepthNetResult<EfficientUNet<B>> {
        self.validate()?;

        let bb = create_backbone(&self.backbone, self.input.channels, device);
        let taps = bb.output_channels();

        // Deepest tap feeds the first stage; the remaining taps are skips.
        let mut in_channels = taps[4];
        let mut decoder = Vec::with_capacity(4);
        for (&skip_channels, &out_channels) in taps[..4].iter().rev().zip(&self.decoder_channels) {
            decoder.push(
                DecoderBlockConfig::new(in_channels, skip_channels, out_channels)
                    .with_num_convs(1)
                    .init(device),
            );
            in_channels = out_channels;
        }

        let head = Conv2dConfig::new([in_channels, 1], [1, 1])
            .with_initializer(Initializer::XavierUniform { gain: 1.0 })
            .init(device);

        let factor = if self.restore_input_resolution { 2 } else { 1 };

        Ok(EfficientUNet {
            bb,
            decoder,
            head,
            restore: UpsampleNearestConfig::new().with_factor(factor).init(),
            input_shape: self.input.as_array(),
        })
    }
}

#[derive(Module, Debug)]
pub struct EfficientUNet<B: Backend> {
    pub(crate) bb: BackboneWrapper<B>,
    decoder: Vec<DecoderBlock<B>>,
    head: Conv2d<B>,
    restore: UpsampleNearest,
    input_shape: [usize; 3],
}

impl<B: Backend> EfficientUNet<B> {
    /// Encoder taps at strides 2, 4, 8, 16 and 32.
    pub fn forward_enc(&self, x: Tensor<B, 4>) -> [Tensor<B, 4>; 5] {
        self.bb.forward(x)
    }

    /// # Shapes
    ///   - input: `[batch, channels, height, width]`
    ///   - output: `[batch, 1, height, width]`, or half of each side without
    ///     `restore_input_resolution`
    ///
    /// # Errors
    ///
    /// Returns `Err(DepthNetError::InvalidTensorShape)` if `x` does not match the
    /// declared input.
    pub fn forward(&self, x: Tensor<B, 4>) -> DepthNetResult<Tensor<B, 4>> {
        self.input_shape().check_tensor(x.dims())?;

        let [x1, x2, x3, x4, x5] = self.forward_enc(x);

        let mut x = x5;
        for (block, skip) in self.decoder.iter().zip([x4, x3, x2, x1]) {
            x = block.forward(x, skip);
        }

        Ok(self.restore.forward(self.head.forward(x)))
    }

    /// The input size this network was built for.
    pub const fn input_shape(&self) -> InputShape {
        InputShape::from_array(self.input_shape)
    }

    /// Channels of the encoder taps.
    pub fn encoder_channels(&self) -> [usize; 5] {
        self.bb.output_channels()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::Distribution};

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_forward_restores_input_resolution() {
        let device = Default::default();
        let config = EfficientUNetConfig::new(InputShape::new(64, 32));
        let model = config.init::<TestBackend>(&device).unwrap();

        let x = Tensor::random([1, 3, 64, 32], Distribution::Normal(0.0, 1.0), &device);
        let y = model.forward(x).unwrap();

        assert_eq!(y.dims(), [1, 1, 64, 32]);
        assert_eq!(config.output_size(), [64, 32]);
    }

    #[test]
    fn test_half_resolution_output() {
        let device = Default::default();
        let config = EfficientUNetConfig::new(InputShape::new(32, 64).with_channels(1))
            .with_restore_input_resolution(false);
        let model = config.init::<TestBackend>(&device).unwrap();

        let y = model.forward(Tensor::zeros([2, 1, 32, 64], &device)).unwrap();

        assert_eq!(y.dims(), [2, 1, 16, 32]);
        assert_eq!(config.output_size(), [16, 32]);
    }

    #[test]
    fn test_encoder_taps() {
        let device = Default::default();
        let model = EfficientUNetConfig::new(InputShape::new(64, 64))
            .init::<TestBackend>(&device)
            .unwrap();

        assert_eq!(model.encoder_channels(), [96, 144, 240, 672, 1280]);

        let taps = model.forward_enc(Tensor::zeros([1, 3, 64, 64], &device));
        let sides: Vec<usize> = taps.iter().map(|t| t.dims()[2]).collect();
        assert_eq!(sides, vec![32, 16, 8, 4, 2]);
    }

    #[test]
    fn test_rejects_size_not_divisible_by_32() {
        let device = Default::default();
        let result = EfficientUNetConfig::new(InputShape::new(48, 64)).init::<TestBackend>(&device);

        assert!(matches!(
            result,
            Err(DepthNetError::IncompatibleSpatialSize { multiple: 32, .. })
        ));
    }

    #[test]
    fn test_rejects_zero_decoder_channels() {
        let device = Default::default();
        let result = EfficientUNetConfig::new(InputShape::new(32, 32))
            .with_decoder_channels([256, 0, 64, 32])
            .init::<TestBackend>(&device);

        assert!(matches!(
            result,
            Err(DepthNetError::InvalidConfiguration { .. })
        ));
    }
}
