//! EfficientNet block implementations.
//!
//! This module contains the building blocks of EfficientNet: the fused
//! convolution/normalization/activation unit, squeeze-and-excitation and the
//! mobile inverted bottleneck (MBConv).

use core::f64::consts::SQRT_2;

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::sigmoid,
};
use burn_extra_ops::{DropPath, DropPathConfig, Silu};

/// Batch normalization hyper-parameters shared by every block of a network.
#[derive(Config, Debug, PartialEq)]
pub struct NormSettings {
    #[config(default = "1e-5")]
    pub epsilon: f64,
    #[config(default = "0.1")]
    pub momentum: f64,
}

impl NormSettings {
    fn init<B: Backend>(&self, channels: usize, device: &Device<B>) -> BatchNorm<B, 2> {
        BatchNormConfig::new(channels)
            .with_epsilon(self.epsilon)
            .with_momentum(self.momentum)
            .init(device)
    }
}

/// Convolution followed by batch norm and an optional SiLU.
/// Derived from torchvision.ops.Conv2dNormActivation
#[derive(Module, Debug)]
pub struct ConvNormActivation<B: Backend> {
    conv: Conv2d<B>,
    norm: BatchNorm<B, 2>,
    silu: Silu,
    activate: bool,
}

impl<B: Backend> ConvNormActivation<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.conv.forward(input);
        let out = self.norm.forward(out);
        if self.activate {
            self.silu.forward(out)
        } else {
            out
        }
    }

    /// Create a bias-free `kernel x kernel` convolution with symmetric padding.
    pub fn new(
        channels: [usize; 2],
        kernel: usize,
        stride: usize,
        groups: usize,
        activate: bool,
        norm: &NormSettings,
        device: &Device<B>,
    ) -> Self {
        let padding = (kernel - 1) / 2;
        let conv = Conv2dConfig::new(channels, [kernel, kernel])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(padding, padding))
            .with_groups(groups)
            .with_bias(false)
            .with_initializer(Initializer::KaimingNormal {
                gain: SQRT_2,
                fan_out_only: true,
            })
            .init(device);

        Self {
            conv,
            norm: norm.init(channels[1], device),
            silu: Silu::new(),
            activate,
        }
    }
}

/// Channel attention: global pooling, bottleneck, sigmoid gate.
/// Derived from torchvision.ops.SqueezeExcitation
#[derive(Module, Debug)]
pub struct SqueezeExcitation<B: Backend> {
    fc1: Conv2d<B>,
    fc2: Conv2d<B>,
    silu: Silu,
}

impl<B: Backend> SqueezeExcitation<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let scale = input.clone().mean_dim(2).mean_dim(3);
        let scale = self.fc1.forward(scale);
        let scale = self.silu.forward(scale);
        let scale = sigmoid(self.fc2.forward(scale));
        input * scale
    }

    pub fn new(channels: usize, squeeze_channels: usize, device: &Device<B>) -> Self {
        let fc1 = Conv2dConfig::new([channels, squeeze_channels], [1, 1]).init(device);
        let fc2 = Conv2dConfig::new([squeeze_channels, channels], [1, 1]).init(device);
        Self {
            fc1,
            fc2,
            silu: Silu::new(),
        }
    }
}

/// Hyper-parameters of a single MBConv block.
#[derive(Debug, Clone, PartialEq)]
pub struct MBConvSettings {
    pub in_channels: usize,
    pub expanded_channels: usize,
    pub out_channels: usize,
    pub kernel: usize,
    pub stride: usize,
    pub drop_prob: f64,
}

/// Mobile inverted bottleneck block.
/// Derived from torchvision.models.efficientnet.MBConv
#[derive(Module, Debug)]
pub struct MBConv<B: Backend> {
    expand: Option<ConvNormActivation<B>>,
    depthwise: ConvNormActivation<B>,
    se: SqueezeExcitation<B>,
    project: ConvNormActivation<B>,
    drop_path: DropPath,
    use_residual: bool,
}

impl<B: Backend> MBConv<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward_with_expansion(input).0
    }

    /// Forward pass that also returns the activation after the expansion
    /// convolution (the block input when the block does not expand).
    pub fn forward_with_expansion(&self, input: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let expanded = match &self.expand {
            Some(expand) => expand.forward(input.clone()),
            None => input.clone(),
        };

        let out = self.depthwise.forward(expanded.clone());
        let out = self.se.forward(out);
        let out = self.project.forward(out);

        let out = if self.use_residual {
            self.drop_path.forward(out) + input
        } else {
            out
        };

        (out, expanded)
    }

    pub fn new(
        settings: &MBConvSettings,
        norm: &NormSettings,
        training: bool,
        device: &Device<B>,
    ) -> Self {
        let MBConvSettings {
            in_channels,
            expanded_channels,
            out_channels,
            kernel,
            stride,
            drop_prob,
        } = *settings;

        let expand = (expanded_channels != in_channels).then(|| {
            ConvNormActivation::new(
                [in_channels, expanded_channels],
                1,
                1,
                1,
                true,
                norm,
                device,
            )
        });

        let depthwise = ConvNormActivation::new(
            [expanded_channels, expanded_channels],
            kernel,
            stride,
            expanded_channels,
            true,
            norm,
            device,
        );

        let squeeze_channels = (in_channels / 4).max(1);
        let se = SqueezeExcitation::new(expanded_channels, squeeze_channels, device);

        let project = ConvNormActivation::new(
            [expanded_channels, out_channels],
            1,
            1,
            1,
            false,
            norm,
            device,
        );

        let drop_path = DropPathConfig::new()
            .with_drop_prob(drop_prob)
            .with_training(training)
            .init();

        Self {
            expand,
            depthwise,
            se,
            project,
            drop_path,
            use_residual: stride == 1 && in_channels == out_channels,
        }
    }

    pub const fn has_residual(&self) -> bool {
        self.use_residual
    }
}
