//! Core configuration structures for DepthNet.

use burn::prelude::*;

use crate::error::{DepthNetError, DepthNetResult};

/// Declared input of a network: image height, width and channel count.
///
/// The graph is built for this size; `forward` rejects anything else.
#[derive(Config, Debug, PartialEq, Eq)]
pub struct InputShape {
    pub height: usize,
    pub width: usize,
    #[config(default = "3")]
    pub channels: usize,
}

impl InputShape {
    /// Validate the declared input for a network that downsamples by
    /// `multiple` in total.
    ///
    /// # Errors
    ///
    /// Returns `Err(DepthNetError::InvalidConfiguration)` for zero-sized dimensions.
    /// Returns `Err(DepthNetError::IncompatibleSpatialSize)` if height or width is
    /// not divisible by `multiple`.
    pub fn validate(&self, multiple: usize) -> DepthNetResult<()> {
        if self.height == 0 || self.width == 0 || self.channels == 0 {
            return Err(DepthNetError::InvalidConfiguration {
                reason: format!(
                    "Input dimensions must be non-zero, got {}x{}x{}",
                    self.height, self.width, self.channels
                ),
            });
        }

        if self.height % multiple != 0 || self.width % multiple != 0 {
            return Err(DepthNetError::IncompatibleSpatialSize {
                height: self.height,
                width: self.width,
                multiple,
            });
        }

        Ok(())
    }

    /// Check a `[batch, channels, height, width]` tensor shape against the declaration.
    ///
    /// # Errors
    ///
    /// Returns `Err(DepthNetError::InvalidTensorShape)` on any mismatch or an empty batch.
    pub fn check_tensor(&self, dims: [usize; 4]) -> DepthNetResult<()> {
        let [batch, channels, height, width] = dims;
        if batch == 0
            || channels != self.channels
            || height != self.height
            || width != self.width
        {
            return Err(DepthNetError::InvalidTensorShape {
                expected: format!(
                    "[batch, {}, {}, {}]",
                    self.channels, self.height, self.width
                ),
                actual: format!("{dims:?}"),
            });
        }
        Ok(())
    }

    pub const fn as_array(&self) -> [usize; 3] {
        [self.height, self.width, self.channels]
    }

    pub const fn from_array(shape: [usize; 3]) -> Self {
        Self {
            height: shape[0],
            width: shape[1],
            channels: shape[2],
        }
    }
}
