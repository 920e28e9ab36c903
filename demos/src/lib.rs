//! DepthNet command line tools.
//!
//! ## Available tools
//!
//! - `summary`: Build a model and print its structure, size and output shape
//! - `predict`: Predict depth maps for an image or a directory of images
//! - `convert`: Load torchvision EfficientNet weights and save a Burn record
//!
//! ## Usage
//!
//! ```bash
//! # Inspect the EfficientNet U-Net for 480x640 RGB input
//! cargo run --bin summary -- efficient-unet --height 480 --width 640
//!
//! # Build an ImageNet-initialized model and save it
//! cargo run --bin convert -- --output models/depthnet.mpk
//!
//! # Predict depth maps
//! cargo run --bin predict -- images/ --weights models/depthnet.mpk --output outputs/
//! ```

pub mod common;
pub mod config;

pub use common::{
    collect_images, create_device, get_backend_name, init_tracing, ImageUtils, SelectedBackend,
    SelectedDevice,
};
pub use config::{ConvertConfig, PredictConfig};
