//! Additional operations for the Burn deep learning framework
//!
//! Small building blocks shared by the DepthNet backbones and decoders that
//! are not (or not conveniently) available in core Burn.

mod drop_path;
mod silu;
mod upsample;

pub use drop_path::{DropPath, DropPathConfig};
pub use silu::Silu;
pub use upsample::{upsample_nearest, UpsampleNearest, UpsampleNearestConfig};
