use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        Initializer, PaddingConfig2d, Relu,
    },
    prelude::*,
};

/// Stack of `num_convs` 3x3 convolutions with `same` padding, each followed by ReLU.
#[derive(Config, Debug)]
pub struct ConvBlockConfig {
    in_channels: usize,
    out_channels: usize,
    #[config(default = "2")]
    num_convs: usize,
}

impl ConvBlockConfig {
    /// Initializes a `ConvBlock` module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ConvBlock<B> {
        let convs = (0..self.num_convs)
            .map(|i| {
                let in_channels = if i == 0 {
                    self.in_channels
                } else {
                    self.out_channels
                };
                Conv2dConfig::new([in_channels, self.out_channels], [3, 3])
                    .with_padding(PaddingConfig2d::Same)
                    .with_initializer(Initializer::XavierUniform { gain: 1.0 })
                    .init(device)
            })
            .collect();

        ConvBlock {
            convs,
            relu: Relu::new(),
        }
    }
}

#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    convs: Vec<Conv2d<B>>,
    relu: Relu,
}

impl<B: Backend> ConvBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.convs
            .iter()
            .fold(x, |x, conv| self.relu.forward(conv.forward(x)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::Distribution};

    type TestBackend = NdArray<f32>;

    #[test]
    fn preserves_spatial_size() {
        let device = Default::default();
        let block = ConvBlockConfig::new(3, 8).init::<TestBackend>(&device);
        let x = Tensor::random([2, 3, 12, 20], Distribution::Normal(0.0, 1.0), &device);

        assert_eq!(block.forward(x).dims(), [2, 8, 12, 20]);
    }

    #[test]
    fn output_is_rectified() {
        let device = Default::default();
        let block = ConvBlockConfig::new(4, 4)
            .with_num_convs(1)
            .init::<TestBackend>(&device);
        let x = Tensor::random([1, 4, 8, 8], Distribution::Normal(0.0, 1.0), &device);

        let min: f32 = block.forward(x).min().into_scalar();
        assert!(min >= 0.0);
    }

    #[test]
    fn parameter_count_matches_two_convs() {
        let device = Default::default();
        let block = ConvBlockConfig::new(1, 64).init::<TestBackend>(&device);

        // (3*3*1*64 + 64) + (3*3*64*64 + 64)
        assert_eq!(block.num_params(), 640 + 36_928);
    }
}
