use burn::prelude::*;
use burn_extra_ops::{UpsampleNearest, UpsampleNearestConfig};

use super::{ConvBlock, ConvBlockConfig};

/// Upsample x2, concatenate `[upsampled, skip]` on the channel axis, convolve.
#[derive(Config, Debug)]
pub struct DecoderBlockConfig {
    in_channels: usize,
    skip_channels: usize,
    out_channels: usize,
    #[config(default = "2")]
    num_convs: usize,
}

impl DecoderBlockConfig {
    /// Initializes a `DecoderBlock` module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> DecoderBlock<B> {
        DecoderBlock {
            up: UpsampleNearestConfig::new().init(),
            conv: ConvBlockConfig::new(self.in_channels + self.skip_channels, self.out_channels)
                .with_num_convs(self.num_convs)
                .init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct DecoderBlock<B: Backend> {
    up: UpsampleNearest,
    conv: ConvBlock<B>,
}

impl<B: Backend> DecoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>, skip: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.up.forward(x);
        self.conv.forward(Tensor::cat(vec![x, skip], 1))
    }
}
