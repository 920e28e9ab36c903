//! Run configuration for the DepthNet tools.
//!
//! Every tool accepts an optional JSON file with these structures; command
//! line flags override individual fields.

use std::path::PathBuf;

use depthnet::{Architecture, DepthNetConfig, EfficientNetVariant, InputShape};
use serde::{Deserialize, Serialize};

/// Configuration for the `predict` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictConfig {
    /// Model configuration.
    pub model: DepthNetConfig,
    /// Burn `.mpk` record to load; random weights when absent.
    pub weights: Option<PathBuf>,
    /// Directory the depth maps are written to.
    pub output_path: PathBuf,
    /// Apply ImageNet mean/std normalization to RGB input.
    pub imagenet_normalization: bool,
    /// Resize each depth map back to its source image size.
    pub preserve_original_resolution: bool,
}

impl Default for PredictConfig {
    fn default() -> Self {
        Self {
            model: DepthNetConfig::new(InputShape::new(256, 256)),
            weights: None,
            output_path: PathBuf::from("outputs"),
            imagenet_normalization: false,
            preserve_original_resolution: true,
        }
    }
}

/// Configuration for the `convert` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// torchvision EfficientNet checkpoint (`.pth`); the torch hub cache is
    /// searched when absent.
    pub input_path: Option<PathBuf>,
    /// Output record path (Burn `.mpk` file).
    pub output_path: PathBuf,
    /// Model configuration, saved next to the record as JSON.
    pub model: DepthNetConfig,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            input_path: None,
            output_path: PathBuf::from("models/depthnet.mpk"),
            model: DepthNetConfig::new(InputShape::new(256, 256))
                .with_architecture(Architecture::EfficientUNet(EfficientNetVariant::B0)),
        }
    }
}
