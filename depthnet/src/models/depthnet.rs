//! Configuration driven wrapper over both architectures.

use backbones::BackboneType;
use burn::prelude::*;

use super::{EfficientUNet, EfficientUNetConfig, UNet, UNetConfig};
use crate::{
    config::{Architecture, InputShape},
    error::DepthNetResult,
};

/// Configuration for the [`DepthNet`] model.
///
/// Serializable with `Config::save`/`Config::load`, so a model and the
/// checkpoint recorded from it can be rebuilt from a single JSON file.
#[derive(Config, Debug)]
pub struct DepthNetConfig {
    /// Declared input size.
    pub input: InputShape,
    /// Which network to build.
    #[config(default = "Architecture::UNet")]
    pub architecture: Architecture,
}

impl DepthNetConfig {
    /// Validate the configuration for the selected architecture.
    ///
    /// # Errors
    ///
    /// Returns the error the selected model's configuration would report.
    pub fn validate(&self) -> DepthNetResult<()> {
        match &self.architecture {
            Architecture::UNet => self.unet().validate(),
            Architecture::EfficientUNet(_) => self.efficient_unet().validate(),
        }
    }

    fn unet(&self) -> UNetConfig {
        UNetConfig::new(self.input.clone())
    }

    fn efficient_unet(&self) -> EfficientUNetConfig {
        let mut config = EfficientUNetConfig::new(self.input.clone());
        if let Architecture::EfficientUNet(variant) = &self.architecture {
            config = config.with_backbone(BackboneType::EfficientNet(variant.clone()));
        }
        config
    }

    /// Initializes the selected model.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> DepthNetResult<DepthNet<B>> {
        let model = match &self.architecture {
            Architecture::UNet => DepthNet::UNet(self.unet().init(device)?),
            Architecture::EfficientUNet(_) => {
                DepthNet::EfficientUNet(self.efficient_unet().init(device)?)
            }
        };

        tracing::debug!(
            architecture = ?self.architecture,
            height = self.input.height,
            width = self.input.width,
            channels = self.input.channels,
            params = model.num_params(),
            "Initialized DepthNet"
        );

        Ok(model)
    }
}

#[derive(Module, Debug)]
pub enum DepthNet<B: Backend> {
    UNet(UNet<B>),
    EfficientUNet(EfficientUNet<B>),
}

impl<B: Backend> DepthNet<B> {
    /// Predict a single-channel map for a `[batch, channels, height, width]` input.
    ///
    /// # Errors
    ///
    /// Returns an error if `x` does not match the declared input.
    pub fn forward(&self, x: Tensor<B, 4>) -> DepthNetResult<Tensor<B, 4>> {
        match self {
            Self::UNet(model) => model.forward(x),
            Self::EfficientUNet(model) => model.forward(x),
        }
    }

    pub const fn input_shape(&self) -> InputShape {
        match self {
            Self::UNet(model) => model.input_shape(),
            Self::EfficientUNet(model) => model.input_shape(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backbones::EfficientNetVariant;
    use burn::{
        backend::NdArray,
        record::{FullPrecisionSettings, NamedMpkFileRecorder},
    };

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_dispatches_to_unet() {
        let device = Default::default();
        let model = DepthNetConfig::new(InputShape::new(16, 32).with_channels(1))
            .init::<TestBackend>(&device)
            .unwrap();

        assert!(matches!(model, DepthNet::UNet(_)));
        let y = model.forward(Tensor::zeros([1, 1, 16, 32], &device)).unwrap();
        assert_eq!(y.dims(), [1, 1, 16, 32]);
    }

    #[test]
    fn test_architecture_multiple_is_enforced() {
        let config = DepthNetConfig::new(InputShape::new(48, 48));
        assert!(config.validate().is_ok());

        let config = config.with_architecture(Architecture::EfficientUNet(EfficientNetVariant::B0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = DepthNetConfig::new(InputShape::new(64, 96))
            .with_architecture(Architecture::EfficientUNet(EfficientNetVariant::B2));

        let path = std::env::temp_dir().join(format!("depthnet-config-{}.json", std::process::id()));
        config.save(&path).unwrap();
        let restored = DepthNetConfig::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(restored.input, config.input);
        assert_eq!(restored.architecture, config.architecture);
    }

    #[test]
    fn test_record_save_and_load() {
        let device = Default::default();
        let config = UNetConfig::new(InputShape::new(16, 16)).with_base_channels(4);
        let model = DepthNet::UNet(config.init::<TestBackend>(&device).unwrap());

        let path = std::env::temp_dir().join(format!("depthnet-record-{}", std::process::id()));
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        model.clone().save_file(&path, &recorder).unwrap();

        let loaded = DepthNet::UNet(config.init::<TestBackend>(&device).unwrap())
            .load_file(&path, &recorder, &device)
            .unwrap();

        let x = Tensor::<TestBackend, 4>::ones([1, 3, 16, 16], &device);
        let expected = model.forward(x.clone()).unwrap();
        let actual = loaded.forward(x).unwrap();
        let max_diff: f32 = (expected - actual).abs().max().into_scalar();
        assert!(max_diff < 1e-6);

        let _ = std::fs::remove_file(path.with_extension("mpk"));
    }
}
