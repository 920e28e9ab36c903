//! EfficientNet implementation for DepthNet backbones.
//!
//! This crate provides EfficientNet-B0..B7 as a headless feature extractor.
//! The module tree follows torchvision's `EfficientNet` so that its ImageNet
//! checkpoints map onto it. The exposed feature taps are the activations a
//! U-Net decoder reads: `block{2,3,4,6}a_expand_activation` and `top_activation`.

use burn::{module::Ignored, prelude::*};

mod blocks;
pub use blocks::*;

/// Total stride between the input and the deepest feature map.
pub const REDUCTION: usize = 32;

/// Per-channel ImageNet statistics the pretrained weights were trained with.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Stages (0-based) whose first block exposes its expansion activation.
const TAP_STAGES: [usize; 4] = [1, 2, 3, 5];

const STEM_CHANNELS: usize = 32;
const HEAD_CHANNELS: usize = 320;

/// B0 stage table: (expand ratio, kernel, stride, in, out, repeats)
const B0_STAGES: [(f64, usize, usize, usize, usize, usize); 7] = [
    (1.0, 3, 1, 32, 16, 1),
    (6.0, 3, 2, 16, 24, 2),
    (6.0, 5, 2, 24, 40, 2),
    (6.0, 3, 2, 40, 80, 3),
    (6.0, 5, 1, 80, 112, 3),
    (6.0, 5, 2, 112, 192, 4),
    (6.0, 3, 1, 192, 320, 1),
];

/// Compound-scaled EfficientNet variants.
#[derive(Config, Debug, PartialEq)]
pub enum EfficientNetVariant {
    B0,
    B1,
    B2,
    B3,
    B4,
    B5,
    B6,
    B7,
}

impl EfficientNetVariant {
    /// Width and depth multipliers.
    pub const fn scaling(&self) -> (f64, f64) {
        match self {
            Self::B0 => (1.0, 1.0),
            Self::B1 => (1.0, 1.1),
            Self::B2 => (1.1, 1.2),
            Self::B3 => (1.2, 1.4),
            Self::B4 => (1.4, 1.8),
            Self::B5 => (1.6, 2.2),
            Self::B6 => (1.8, 2.6),
            Self::B7 => (2.0, 3.1),
        }
    }

    /// The larger torchvision variants were trained with different BN settings.
    pub fn norm_settings(&self) -> NormSettings {
        match self {
            Self::B5 | Self::B6 | Self::B7 => NormSettings::new()
                .with_epsilon(1e-3)
                .with_momentum(0.01),
            _ => NormSettings::new(),
        }
    }

    /// Prefix of the torchvision checkpoint file name, e.g. `efficientnet_b0_`.
    pub const fn checkpoint_prefix(&self) -> &'static str {
        match self {
            Self::B0 => "efficientnet_b0_",
            Self::B1 => "efficientnet_b1_",
            Self::B2 => "efficientnet_b2_",
            Self::B3 => "efficientnet_b3_",
            Self::B4 => "efficientnet_b4_",
            Self::B5 => "efficientnet_b5_",
            Self::B6 => "efficientnet_b6_",
            Self::B7 => "efficientnet_b7_",
        }
    }
}

/// Round `value` to the nearest multiple of `divisor`, never dropping more
/// than 10% below the unrounded value.
pub fn make_divisible(value: f64, divisor: usize) -> usize {
    let rounded = (((value + divisor as f64 / 2.0) as usize) / divisor * divisor).max(divisor);
    if (rounded as f64) < 0.9 * value {
        rounded + divisor
    } else {
        rounded
    }
}

/// Scaled settings of one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSettings {
    pub expand_ratio: f64,
    pub kernel: usize,
    pub stride: usize,
    pub in_channels: usize,
    pub out_channels: usize,
    pub repeats: usize,
}

impl StageSettings {
    /// Channels after the expansion convolution of the stage's first block.
    pub fn expanded_channels(&self) -> usize {
        make_divisible(self.in_channels as f64 * self.expand_ratio, 8)
    }
}

/// EfficientNet configuration
#[derive(Config, Debug)]
pub struct EfficientNetConfig {
    /// Compound scaling variant.
    #[config(default = "EfficientNetVariant::B0")]
    pub variant: EfficientNetVariant,
    /// Channels of the input image.
    #[config(default = "3")]
    pub in_channels: usize,
    /// Stochastic depth probability reached by the last block.
    #[config(default = "0.2")]
    pub stochastic_depth_prob: f64,
    /// Enables stochastic depth.
    #[config(default = "false")]
    pub training: bool,
}

impl EfficientNetConfig {
    /// Stage table after width/depth scaling.
    pub fn stages(&self) -> Vec<StageSettings> {
        let (width, depth) = self.variant.scaling();
        B0_STAGES
            .iter()
            .map(
                |&(expand_ratio, kernel, stride, in_channels, out_channels, repeats)| {
                    StageSettings {
                        expand_ratio,
                        kernel,
                        stride,
                        in_channels: make_divisible(in_channels as f64 * width, 8),
                        out_channels: make_divisible(out_channels as f64 * width, 8),
                        repeats: (repeats as f64 * depth).ceil() as usize,
                    }
                },
            )
            .collect()
    }

    /// Channels of the stem convolution.
    pub fn stem_channels(&self) -> usize {
        make_divisible(STEM_CHANNELS as f64 * self.variant.scaling().0, 8)
    }

    /// Channels of the final 1x1 convolution (`top_activation`).
    pub fn head_channels(&self) -> usize {
        4 * make_divisible(HEAD_CHANNELS as f64 * self.variant.scaling().0, 8)
    }

    /// Channels of the five feature taps, shallowest first.
    pub fn tap_channels(&self) -> [usize; 5] {
        let stages = self.stages();
        let [a, b, c, d] = TAP_STAGES.map(|idx| stages[idx].expanded_channels());
        [a, b, c, d, self.head_channels()]
    }

    /// Initialize the EfficientNet feature extractor.
    pub fn init<B: Backend>(&self, device: &B::Device) -> EfficientNet<B> {
        let norm = self.variant.norm_settings();
        let stage_settings = self.stages();
        let total_blocks: usize = stage_settings.iter().map(|s| s.repeats).sum();

        let stem = ConvNormActivation::new(
            [self.in_channels, self.stem_channels()],
            3,
            2,
            1,
            true,
            &norm,
            device,
        );

        let mut block_id = 0;
        let stages: Vec<EfficientNetStage<B>> = stage_settings
            .iter()
            .map(|stage| {
                let blocks = (0..stage.repeats)
                    .map(|i| {
                        let in_channels = if i == 0 {
                            stage.in_channels
                        } else {
                            stage.out_channels
                        };
                        let settings = MBConvSettings {
                            in_channels,
                            expanded_channels: make_divisible(
                                in_channels as f64 * stage.expand_ratio,
                                8,
                            ),
                            out_channels: stage.out_channels,
                            kernel: stage.kernel,
                            stride: if i == 0 { stage.stride } else { 1 },
                            drop_prob: self.stochastic_depth_prob * block_id as f64
                                / total_blocks as f64,
                        };
                        block_id += 1;
                        MBConv::new(&settings, &norm, self.training, device)
                    })
                    .collect();
                EfficientNetStage { blocks }
            })
            .collect();

        let last_stage_channels = stage_settings[stage_settings.len() - 1].out_channels;
        let head = ConvNormActivation::new(
            [last_stage_channels, self.head_channels()],
            1,
            1,
            1,
            true,
            &norm,
            device,
        );

        EfficientNet {
            stem,
            stages,
            head,
            tap_channels: Ignored(self.tap_channels()),
        }
    }
}

/// The MBConv blocks sharing one row of the stage table.
///
/// A named field keeps record keys at `stages.{stage}.blocks.{block}`; a bare
/// nested `Vec` cannot be rebuilt from flat checkpoint keys.
#[derive(Module, Debug)]
pub struct EfficientNetStage<B: Backend> {
    pub blocks: Vec<MBConv<B>>,
}

impl<B: Backend> EfficientNetStage<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.blocks.iter().fold(x, |x, block| block.forward(x))
    }
}

/// EfficientNet backbone without the classification head.
/// Derived from torchvision.models.efficientnet.EfficientNet
#[derive(Module, Debug)]
pub struct EfficientNet<B: Backend> {
    pub stem: ConvNormActivation<B>,
    pub stages: Vec<EfficientNetStage<B>>,
    pub head: ConvNormActivation<B>,
    tap_channels: Ignored<[usize; 5]>,
}

impl<B: Backend> EfficientNet<B> {
    /// Forward pass returning the five decoder taps, shallowest first:
    /// strides 2, 4, 8, 16 and 32.
    pub fn forward_features(&self, input: Tensor<B, 4>) -> [Tensor<B, 4>; 5] {
        let x = self.stem.forward(input);
        let x = self.forward_stage(0, x);
        let (x, block2a) = self.forward_stage_tapped(1, x);
        let (x, block3a) = self.forward_stage_tapped(2, x);
        let (x, block4a) = self.forward_stage_tapped(3, x);
        let x = self.forward_stage(4, x);
        let (x, block6a) = self.forward_stage_tapped(5, x);
        let x = self.forward_stage(6, x);
        let top = self.head.forward(x);

        [block2a, block3a, block4a, block6a, top]
    }

    /// Channels of the tensors returned by [`Self::forward_features`].
    pub fn tap_channels(&self) -> [usize; 5] {
        *self.tap_channels
    }

    /// Number of MBConv blocks.
    pub fn num_blocks(&self) -> usize {
        self.stages.iter().map(|stage| stage.blocks.len()).sum()
    }

    fn forward_stage(&self, stage: usize, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.stages[stage].forward(x)
    }

    fn forward_stage_tapped(&self, stage: usize, x: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let mut blocks = self.stages[stage].blocks.iter();
        match blocks.next() {
            Some(first) => {
                let (x, tap) = first.forward_with_expansion(x);
                (blocks.fold(x, |x, block| block.forward(x)), tap)
            }
            None => (x.clone(), x),
        }
    }
}

/// Normalize a `[batch, 3, height, width]` image in `[0, 1]` with the
/// ImageNet mean and standard deviation.
pub fn normalize_imagenet<B: Backend>(image: Tensor<B, 4>) -> Tensor<B, 4> {
    let device = image.device();
    let mean = Tensor::<B, 1>::from_floats(IMAGENET_MEAN, &device).reshape([1, 3, 1, 1]);
    let std = Tensor::<B, 1>::from_floats(IMAGENET_STD, &device).reshape([1, 3, 1, 1]);
    (image - mean) / std
}
