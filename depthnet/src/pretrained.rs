//! Loading ImageNet weights into the EfficientNet encoder.
//!
//! Checkpoints are torchvision `efficientnet_bN_*` state dicts, either the
//! pickled `.pth` torch hub downloads or a `.safetensors` export. Their keys
//! follow torchvision's `features.{i}` layout and are remapped onto this
//! crate's `stem` / `stages.{s}.blocks.{b}` / `head` module tree before loading.

use std::{
    env,
    path::{Path, PathBuf},
};

use backbones::{BackboneWrapper, EfficientNet, EfficientNetRecord, EfficientNetVariant};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, Recorder},
};
use burn_import::{
    pytorch::{LoadArgs, PyTorchFileRecorder},
    safetensors::{LoadArgs as SafetensorsLoadArgs, SafetensorsFileRecorder},
};

use crate::{
    build_efficientnet_model,
    error::{DepthNetError, DepthNetResult},
    models::EfficientUNet,
};

/// Number of MBConv stages; torchvision stores them as `features.1..=7`.
const NUM_STAGES: usize = 7;

/// Key remaps from torchvision's EfficientNet state dict to [`EfficientNet`]'s record.
///
/// Remaps are applied in order, each to the output of the previous one.
pub fn efficientnet_key_remaps() -> Vec<(String, String)> {
    let mut remaps = vec![
        (r"^features\.0\.0\.(.+)$".into(), "stem.conv.$1".into()),
        (r"^features\.0\.1\.(.+)$".into(), "stem.norm.$1".into()),
        (
            format!(r"^features\.{}\.0\.(.+)$", NUM_STAGES + 1),
            "head.conv.$1".into(),
        ),
        (
            format!(r"^features\.{}\.1\.(.+)$", NUM_STAGES + 1),
            "head.norm.$1".into(),
        ),
    ];

    for stage in 1..=NUM_STAGES {
        // The first stage has an expansion ratio of 1 and no expand convolution.
        let layers: &[&str] = if stage == 1 {
            &["depthwise", "se", "project"]
        } else {
            &["expand", "depthwise", "se", "project"]
        };

        for (index, layer) in layers.iter().enumerate() {
            remaps.push((
                format!(r"^features\.{stage}\.(\d+)\.block\.{index}\.(.+)$"),
                format!("stages.{}.blocks.$1.{layer}.$2", stage - 1),
            ));
        }
    }

    remaps.push((
        r"^(stages\.\d+\.blocks\.\d+\.(?:expand|depthwise|project))\.0\.(.+)$".into(),
        "$1.conv.$2".into(),
    ));
    remaps.push((
        r"^(stages\.\d+\.blocks\.\d+\.(?:expand|depthwise|project))\.1\.(.+)$".into(),
        "$1.norm.$2".into(),
    ));

    remaps
}

/// Load a torchvision EfficientNet checkpoint into `model`.
///
/// # Errors
///
/// Returns `Err(DepthNetError::WeightsNotFound)` if `path` does not exist and
/// `Err(DepthNetError::WeightLoadingFailed)` if the file cannot be decoded into
/// the model's record.
pub fn load_efficientnet_weights<B: Backend>(
    model: EfficientNet<B>,
    path: &Path,
    device: &Device<B>,
) -> DepthNetResult<EfficientNet<B>> {
    if !path.exists() {
        return Err(DepthNetError::WeightsNotFound {
            path: path.display().to_string(),
        });
    }

    let remaps = efficientnet_key_remaps();
    let record: EfficientNetRecord<B> = match path.extension().and_then(|ext| ext.to_str()) {
        Some("safetensors") => {
            let load_args = remaps.iter().fold(
                SafetensorsLoadArgs::new(path.to_path_buf()),
                |args, (pattern, replacement)| args.with_key_remap(pattern, replacement),
            );
            SafetensorsFileRecorder::<FullPrecisionSettings>::default()
                .load(load_args, device)
                .map_err(|e| DepthNetError::WeightLoadingFailed {
                    reason: format!("Safetensors model loading failed: {}", e),
                })?
        }
        _ => {
            let load_args = remaps
                .iter()
                .fold(LoadArgs::new(path.to_path_buf()), |args, (pattern, replacement)| {
                    args.with_key_remap(pattern, replacement)
                });
            PyTorchFileRecorder::<FullPrecisionSettings>::default()
                .load(load_args, device)
                .map_err(|e| DepthNetError::WeightLoadingFailed {
                    reason: format!("PyTorch model loading failed: {}", e),
                })?
        }
    };

    tracing::info!(path = %path.display(), "Loaded EfficientNet weights");

    Ok(model.load_record(record))
}

/// Directory torch hub downloads checkpoints into.
///
/// `$TORCH_HOME/hub/checkpoints` when `TORCH_HOME` is set, otherwise
/// `<cache dir>/torch/hub/checkpoints`.
pub fn torch_hub_checkpoint_dir() -> DepthNetResult<PathBuf> {
    let torch_home = match env::var_os("TORCH_HOME") {
        Some(home) => PathBuf::from(home),
        None => dirs::cache_dir()
            .ok_or_else(|| DepthNetError::WeightsNotFound {
                path: "<cache dir unavailable>".to_string(),
            })?
            .join("torch"),
    };
    Ok(torch_home.join("hub").join("checkpoints"))
}

/// Find a cached torchvision checkpoint for `variant` in `dir`.
///
/// # Errors
///
/// Returns `Err(DepthNetError::WeightsNotFound)` if no `efficientnet_bN_*.pth`
/// file exists in `dir`.
pub fn find_checkpoint(dir: &Path, variant: &EfficientNetVariant) -> DepthNetResult<PathBuf> {
    let not_found = || DepthNetError::WeightsNotFound {
        path: dir.join(format!("{}*.pth", variant.checkpoint_prefix())).display().to_string(),
    };

    let entries = std::fs::read_dir(dir).map_err(|_| not_found())?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension().is_some_and(|ext| ext == "pth")
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(variant.checkpoint_prefix()))
        })
        .collect();

    candidates.sort();
    candidates.pop().ok_or_else(not_found)
}

/// Cached torchvision checkpoint for `variant`.
///
/// # Errors
///
/// Returns `Err(DepthNetError::WeightsNotFound)` if nothing is cached.
pub fn default_checkpoint_path(variant: &EfficientNetVariant) -> DepthNetResult<PathBuf> {
    find_checkpoint(&torch_hub_checkpoint_dir()?, variant)
}

impl<B: Backend> EfficientUNet<B> {
    /// Replace the encoder weights with a torchvision ImageNet checkpoint.
    ///
    /// # Errors
    ///
    /// Returns `Err(DepthNetError::PretrainedChannelMismatch)` unless the model
    /// was built for 3-channel input, or the loading error.
    pub fn with_pretrained_backbone(mut self, path: &Path, device: &Device<B>) -> DepthNetResult<Self> {
        let channels = self.input_shape().channels;
        if channels != 3 {
            return Err(DepthNetError::PretrainedChannelMismatch { channels });
        }

        self.bb = match self.bb {
            BackboneWrapper::EfficientNet(encoder) => {
                BackboneWrapper::EfficientNet(load_efficientnet_weights(encoder, path, device)?)
            }
        };

        Ok(self)
    }
}

/// [`build_efficientnet_model`] with the encoder initialized from the cached
/// torchvision EfficientNet-B0 ImageNet checkpoint.
///
/// # Errors
///
/// Returns an error if the shape is invalid, `num_channels != 3`, or no
/// checkpoint is cached.
pub fn build_pretrained_efficientnet_model<B: Backend>(
    input_height: usize,
    input_width: usize,
    num_channels: usize,
    device: &Device<B>,
) -> DepthNetResult<EfficientUNet<B>> {
    if num_channels != 3 {
        return Err(DepthNetError::PretrainedChannelMismatch {
            channels: num_channels,
        });
    }

    let path = default_checkpoint_path(&EfficientNetVariant::B0)?;
    build_efficientnet_model(input_height, input_width, num_channels, device)?
        .with_pretrained_backbone(&path, device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use backbones::{make_divisible, EfficientNetConfig};
    use burn::backend::NdArray;
    use safetensors::tensor::{Dtype, TensorView};

    type TestBackend = NdArray<f32>;

    fn conv_norm(tensors: &mut Vec<(String, Vec<usize>)>, prefix: &str, weight: Vec<usize>) {
        let channels = weight[0];
        tensors.push((format!("{prefix}.0.weight"), weight));
        for name in ["weight", "bias", "running_mean", "running_var"] {
            tensors.push((format!("{prefix}.1.{name}"), vec![channels]));
        }
    }

    /// Key names and shapes of torchvision's `efficientnet_b0().state_dict()`.
    fn torchvision_b0_layout() -> Vec<(String, Vec<usize>)> {
        let config = EfficientNetConfig::new();
        let stages = config.stages();
        let mut tensors = Vec::new();

        conv_norm(&mut tensors, "features.0", vec![config.stem_channels(), 3, 3, 3]);

        for (s, stage) in stages.iter().enumerate() {
            for b in 0..stage.repeats {
                let in_c = if b == 0 { stage.in_channels } else { stage.out_channels };
                let exp = make_divisible(in_c as f64 * stage.expand_ratio, 8);
                let squeeze = (in_c / 4).max(1);
                let k = stage.kernel;
                let block = format!("features.{}.{b}.block", s + 1);

                let mut index = 0;
                if exp != in_c {
                    conv_norm(&mut tensors, &format!("{block}.{index}"), vec![exp, in_c, 1, 1]);
                    index += 1;
                }
                conv_norm(&mut tensors, &format!("{block}.{index}"), vec![exp, 1, k, k]);
                index += 1;
                tensors.push((format!("{block}.{index}.fc1.weight"), vec![squeeze, exp, 1, 1]));
                tensors.push((format!("{block}.{index}.fc1.bias"), vec![squeeze]));
                tensors.push((format!("{block}.{index}.fc2.weight"), vec![exp, squeeze, 1, 1]));
                tensors.push((format!("{block}.{index}.fc2.bias"), vec![exp]));
                index += 1;
                conv_norm(&mut tensors, &format!("{block}.{index}"), vec![stage.out_channels, exp, 1, 1]);
            }
        }

        let last = stages[stages.len() - 1].out_channels;
        conv_norm(&mut tensors, "features.8", vec![config.head_channels(), last, 1, 1]);
        tensors.push(("classifier.1.weight".into(), vec![1000, config.head_channels()]));
        tensors.push(("classifier.1.bias".into(), vec![1000]));
        tensors
    }

    fn write_safetensors(path: &Path, tensors: &[(String, Vec<usize>)], fill: impl Fn(&str) -> f32) {
        let data: Vec<Vec<u8>> = tensors
            .iter()
            .map(|(key, shape)| fill(key).to_le_bytes().repeat(shape.iter().product()))
            .collect();
        let views = tensors.iter().zip(&data).map(|((key, shape), bytes)| {
            (key.clone(), TensorView::new(Dtype::F32, shape.clone(), bytes).unwrap())
        });
        safetensors::serialize_to_file(views, &None, path).unwrap();
    }

    fn assert_filled<const D: usize>(tensor: Tensor<TestBackend, D>, expected: f32) {
        let values = tensor.into_data().to_vec::<f32>().unwrap();
        assert!(!values.is_empty());
        assert!(
            values.iter().all(|v| (v - expected).abs() < 1e-6),
            "expected every value to be {expected}"
        );
    }

    fn apply(remaps: &[(String, String)], key: &str) -> String {
        remaps.iter().fold(key.to_string(), |key, (pattern, replacement)| {
            regex::Regex::new(pattern)
                .unwrap()
                .replace(&key, replacement.as_str())
                .into_owned()
        })
    }

    #[test]
    fn test_remaps_cover_torchvision_layout() {
        let remaps = efficientnet_key_remaps();

        assert_eq!(apply(&remaps, "features.0.0.weight"), "stem.conv.weight");
        assert_eq!(apply(&remaps, "features.0.1.running_var"), "stem.norm.running_var");
        assert_eq!(
            apply(&remaps, "features.1.0.block.0.0.weight"),
            "stages.0.blocks.0.depthwise.conv.weight"
        );
        assert_eq!(
            apply(&remaps, "features.1.0.block.1.fc2.bias"),
            "stages.0.blocks.0.se.fc2.bias"
        );
        assert_eq!(
            apply(&remaps, "features.2.1.block.0.1.weight"),
            "stages.1.blocks.1.expand.norm.weight"
        );
        assert_eq!(
            apply(&remaps, "features.6.3.block.3.0.weight"),
            "stages.5.blocks.3.project.conv.weight"
        );
        assert_eq!(apply(&remaps, "features.8.1.bias"), "head.norm.bias");
        assert_eq!(apply(&remaps, "classifier.1.weight"), "classifier.1.weight");
    }

    #[test]
    fn test_loads_torchvision_safetensors_checkpoint() {
        let dir = std::env::temp_dir().join(format!("depthnet-st-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("efficientnet_b0.safetensors");

        let layout = torchvision_b0_layout();
        assert_eq!(layout.len(), 311);
        write_safetensors(&path, &layout, |key| match key {
            "features.0.0.weight" => 0.5,
            "features.6.3.block.3.0.weight" => 0.25,
            "features.1.0.block.0.1.weight" => 2.0,
            "features.8.0.weight" => -0.125,
            key if key.ends_with("running_var") => 1.0,
            _ => 0.0,
        });

        let device = Default::default();
        let model = build_efficientnet_model::<TestBackend>(32, 32, 3, &device)
            .unwrap()
            .with_pretrained_backbone(&path, &device)
            .unwrap();

        let BackboneWrapper::EfficientNet(encoder) = &model.bb;
        assert_eq!(encoder.tap_channels(), [96, 144, 240, 672, 1280]);
        assert_filled(encoder.stem.clone().into_record().conv.weight.val(), 0.5);
        assert_filled(encoder.head.clone().into_record().conv.weight.val(), -0.125);

        let project = encoder.stages[5].blocks[3].clone().into_record().project;
        assert_filled(project.conv.weight.val(), 0.25);
        // BatchNorm weight lands in gamma.
        let depthwise = encoder.stages[0].blocks[0].clone().into_record().depthwise;
        assert_filled(depthwise.norm.gamma.val(), 2.0);

        let output = model
            .forward(Tensor::<TestBackend, 4>::ones([1, 3, 32, 32], &device))
            .unwrap();
        assert_eq!(output.dims(), [1, 1, 32, 32]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_rejects_non_rgb_input() {
        let device = Default::default();
        let model = build_efficientnet_model::<TestBackend>(32, 32, 1, &device).unwrap();

        let result = model.with_pretrained_backbone(Path::new("unused.pth"), &device);
        assert!(matches!(
            result,
            Err(DepthNetError::PretrainedChannelMismatch { channels: 1 })
        ));
    }

    #[test]
    fn test_missing_checkpoint() {
        let device = Default::default();
        let model = build_efficientnet_model::<TestBackend>(32, 32, 3, &device).unwrap();

        let result = model.with_pretrained_backbone(Path::new("does/not/exist.pth"), &device);
        assert!(matches!(result, Err(DepthNetError::WeightsNotFound { .. })));
    }

    #[test]
    fn test_find_checkpoint_by_prefix() {
        let dir = std::env::temp_dir().join(format!("depthnet-hub-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("efficientnet_b0_rwightman-7f5810bc.pth"), b"").unwrap();
        std::fs::write(dir.join("efficientnet_b1_rwightman-bac287d4.pth"), b"").unwrap();

        let found = find_checkpoint(&dir, &EfficientNetVariant::B0).unwrap();
        assert!(found.ends_with("efficientnet_b0_rwightman-7f5810bc.pth"));
        assert!(matches!(
            find_checkpoint(&dir, &EfficientNetVariant::B4),
            Err(DepthNetError::WeightsNotFound { .. })
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
