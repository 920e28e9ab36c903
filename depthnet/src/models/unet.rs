//! # U-Net
//!
//! Classic encoder/decoder trained from scratch. Every encoder level runs a
//! [`ConvBlock`] and halves the resolution; the decoder mirrors it, fusing the
//! matching encoder activation through a skip connection, and a 1x1
//! convolution produces a single linear output channel.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Initializer,
    },
    prelude::*,
};

use super::modules::{ConvBlock, ConvBlockConfig, DecoderBlock, DecoderBlockConfig};
use crate::{
    config::InputShape,
    error::{DepthNetError, DepthNetResult},
};

/// Configuration for the [`UNet`] model.
///
/// The defaults give the standard 64 -> 1024 channel schedule with four
/// pooling stages.
#[derive(Config, Debug)]
pub struct UNetConfig {
    /// Declared input size.
    pub input: InputShape,
    /// Channels of the first encoder level, doubled at every level below.
    #[config(default = "64")]
    pub base_channels: usize,
    /// Number of pooling stages (and of decoder stages).
    #[config(default = "4")]
    pub depth: usize,
}

impl UNetConfig {
    /// Total downsampling factor; input sides must be divisible by it.
    pub fn required_multiple(&self) -> usize {
        1 << self.depth
    }

    /// Channels of every encoder level followed by the bottleneck.
    pub fn encoder_channels(&self) -> Vec<usize> {
        (0..=self.depth)
            .map(|level| self.base_channels << level)
            .collect()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Err(DepthNetError::InvalidConfiguration)` for a zero depth or width.
    /// Returns `Err(DepthNetError::IncompatibleSpatialSize)` if the input cannot be
    /// pooled `depth` times without remainder.
    pub fn validate(&self) -> DepthNetResult<()> {
        if self.base_channels == 0 {
            return Err(DepthNetError::InvalidConfiguration {
                reason: "base_channels must be non-zero".to_string(),
            });
        }
        if self.depth == 0 || self.depth > 8 {
            return Err(DepthNetError::InvalidConfiguration {
                reason: format!("depth must be in 1..=8, got {}", self.depth),
            });
        }
        self.input.validate(self.required_multiple())
    }

    /// Initializes a `UNet` model.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> DepthNetResult<UNet<B>> {
        self.validate()?;

        let channels = self.encoder_channels();

        let mut in_channels = self.input.channels;
        let mut encoder = Vec::with_capacity(self.depth);
        for &out_channels in &channels[..self.depth] {
            encoder.push(ConvBlockConfig::new(in_channels, out_channels).init(device));
            in_channels = out_channels;
        }

        let bottleneck = ConvBlockConfig::new(in_channels, channels[self.depth]).init(device);

        let decoder = (0..self.depth)
            .rev()
            .map(|level| {
                DecoderBlockConfig::new(channels[level + 1], channels[level], channels[level])
                    .init(device)
            })
            .collect();

        let head = Conv2dConfig::new([self.base_channels, 1], [1, 1])
            .with_initializer(Initializer::XavierUniform { gain: 1.0 })
            .init(device);

        Ok(UNet {
            encoder,
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            bottleneck,
            decoder,
            head,
            input_shape: self.input.as_array(),
        })
    }
}

#[derive(Module, Debug)]
pub struct UNet<B: Backend> {
    encoder: Vec<ConvBlock<B>>,
    pool: MaxPool2d,
    bottleneck: ConvBlock<B>,
    decoder: Vec<DecoderBlock<B>>,
    head: Conv2d<B>,
    input_shape: [usize; 3],
}

impl<B: Backend> UNet<B> {
    /// Predict a single-channel map of the same spatial size as the input.
    ///
    /// # Shapes
    ///   - input: `[batch, channels, height, width]`
    ///   - output: `[batch, 1, height, width]`
    ///
    /// # Errors
    ///
    /// Returns `Err(DepthNetError::InvalidTensorShape)` if `x` does not match the
    /// declared input.
    pub fn forward(&self, x: Tensor<B, 4>) -> DepthNetResult<Tensor<B, 4>> {
        self.input_shape().check_tensor(x.dims())?;

        let mut skips = Vec::with_capacity(self.encoder.len());
        let mut x = x;
        for block in &self.encoder {
            let features = block.forward(x);
            x = self.pool.forward(features.clone());
            skips.push(features);
        }

        let mut x = self.bottleneck.forward(x);
        for (block, skip) in self.decoder.iter().zip(skips.into_iter().rev()) {
            x = block.forward(x, skip);
        }

        Ok(self.head.forward(x))
    }

    /// The input size this network was built for.
    pub const fn input_shape(&self) -> InputShape {
        InputShape::from_array(self.input_shape)
    }

    pub fn depth(&self) -> usize {
        self.encoder.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::Distribution};

    type TestBackend = NdArray<f32>;

    #[test]
    fn default_schedule() {
        let config = UNetConfig::new(InputShape::new(256, 256));
        assert_eq!(config.encoder_channels(), vec![64, 128, 256, 512, 1024]);
        assert_eq!(config.required_multiple(), 16);
    }

    #[test]
    fn test_forward_keeps_resolution() {
        let device = Default::default();
        let model = UNetConfig::new(InputShape::new(32, 48).with_channels(1))
            .with_base_channels(4)
            .init::<TestBackend>(&device)
            .unwrap();

        let x = Tensor::random([2, 1, 32, 48], Distribution::Normal(0.0, 1.0), &device);
        let y = model.forward(x).unwrap();

        assert_eq!(y.dims(), [2, 1, 32, 48]);
        assert_eq!(model.depth(), 4);
    }

    #[test]
    fn test_shallow_network() {
        let device = Default::default();
        let model = UNetConfig::new(InputShape::new(12, 12))
            .with_base_channels(2)
            .with_depth(2)
            .init::<TestBackend>(&device)
            .unwrap();

        let x = Tensor::zeros([1, 3, 12, 12], &device);
        assert_eq!(model.forward(x).unwrap().dims(), [1, 1, 12, 12]);
    }

    #[test]
    fn test_rejects_mismatched_tensor() {
        let device = Default::default();
        let model = UNetConfig::new(InputShape::new(16, 16))
            .with_base_channels(2)
            .init::<TestBackend>(&device)
            .unwrap();

        let x = Tensor::zeros([1, 3, 32, 32], &device);
        match model.forward(x) {
            Err(DepthNetError::InvalidTensorShape { actual, .. }) => {
                assert!(actual.contains("32"));
            }
            _ => panic!("Expected InvalidTensorShape error"),
        }
    }

    #[test]
    fn test_rejects_indivisible_size() {
        let device = Default::default();
        let result = UNetConfig::new(InputShape::new(100, 64)).init::<TestBackend>(&device);

        match result {
            Err(DepthNetError::IncompatibleSpatialSize {
                height,
                width,
                multiple,
            }) => {
                assert_eq!((height, width, multiple), (100, 64, 16));
            }
            _ => panic!("Expected IncompatibleSpatialSize error"),
        }
    }

    #[test]
    fn test_default_parameter_count() {
        let device = Default::default();
        let model = UNetConfig::new(InputShape::new(16, 16).with_channels(1))
            .init::<TestBackend>(&device)
            .unwrap();

        assert_eq!(model.num_params(), 31_377_793);
    }
}
