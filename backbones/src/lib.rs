//! Backbone implementations for DepthNet
//!
//! This crate provides a unified interface over the pretrained encoders a
//! DepthNet decoder can be attached to.

use burn::prelude::*;

pub use efficientnet::{
    make_divisible, normalize_imagenet, EfficientNet, EfficientNetConfig, EfficientNetRecord,
    EfficientNetStage, EfficientNetVariant, IMAGENET_MEAN, IMAGENET_STD,
};

/// Unified backbone trait for DepthNet
pub trait Backbone<B: Backend> {
    /// Forward pass through the backbone
    ///
    /// # Arguments
    /// * `input` - Input tensor of shape `[batch_size, channels, height, width]`
    ///
    /// # Returns
    /// Five feature maps at strides 2, 4, 8, 16 and 32
    fn forward(&self, input: Tensor<B, 4>) -> [Tensor<B, 4>; 5];

    /// Get output channels for each scale
    fn output_channels(&self) -> [usize; 5];

    /// Stride of the deepest feature map relative to the input.
    fn reduction(&self) -> usize;
}

/// Implement Backbone trait for EfficientNet
impl<B: Backend> Backbone<B> for EfficientNet<B> {
    fn forward(&self, input: Tensor<B, 4>) -> [Tensor<B, 4>; 5] {
        self.forward_features(input)
    }

    fn output_channels(&self) -> [usize; 5] {
        self.tap_channels()
    }

    fn reduction(&self) -> usize {
        efficientnet::REDUCTION
    }
}

/// Enumeration of supported backbone types
#[derive(Config, Debug, PartialEq)]
pub enum BackboneType {
    /// EfficientNet backbone
    EfficientNet(EfficientNetVariant),
}

impl BackboneType {
    /// Stride of the deepest feature map.
    pub const fn reduction(&self) -> usize {
        match self {
            Self::EfficientNet(_) => efficientnet::REDUCTION,
        }
    }
}

/// Enum to wrap different backbone implementations
#[derive(Module, Debug)]
pub enum BackboneWrapper<B: Backend> {
    /// EfficientNet backbone
    EfficientNet(EfficientNet<B>),
}

impl<B: Backend> Backbone<B> for BackboneWrapper<B> {
    fn forward(&self, input: Tensor<B, 4>) -> [Tensor<B, 4>; 5] {
        match self {
            Self::EfficientNet(backbone) => backbone.forward_features(input),
        }
    }

    fn output_channels(&self) -> [usize; 5] {
        match self {
            Self::EfficientNet(backbone) => backbone.tap_channels(),
        }
    }

    fn reduction(&self) -> usize {
        match self {
            Self::EfficientNet(backbone) => Backbone::<B>::reduction(backbone),
        }
    }
}

/// Factory function to create backbones
pub fn create_backbone<B: Backend>(
    backbone_type: &BackboneType,
    in_channels: usize,
    device: &Device<B>,
) -> BackboneWrapper<B> {
    match backbone_type {
        BackboneType::EfficientNet(variant) => BackboneWrapper::EfficientNet(
            EfficientNetConfig::new()
                .with_variant(variant.clone())
                .with_in_channels(in_channels)
                .init(device),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_efficientnet_backbone() {
        let device = Default::default();
        let backbone_type = BackboneType::EfficientNet(EfficientNetVariant::B0);
        let backbone = create_backbone::<TestBackend>(&backbone_type, 3, &device);

        let input = Tensor::<TestBackend, 4>::random(
            [1, 3, 64, 64],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );

        let output = backbone.forward(input);
        let channels = backbone.output_channels();

        assert_eq!(channels, [96, 144, 240, 672, 1280]);
        assert_eq!(backbone.reduction(), 32);

        let strides = [2, 4, 8, 16, 32];
        for ((feature, channels), stride) in output.iter().zip(channels).zip(strides) {
            assert_eq!(feature.dims(), [1, channels, 64 / stride, 64 / stride]);
        }
    }
}
