use thiserror::Error;

/// The error type for `DepthNet-Burn` operations.
///
/// Shape problems that a graph-building framework would only report deep
/// inside a concatenation are caught up front and reported here instead.
#[derive(Error, Debug)]
pub enum DepthNetError {
    /// Error for when an invalid model configuration is provided.
    #[error("Invalid model configuration: {reason}")]
    InvalidConfiguration {
        /// The reason why the configuration is invalid.
        reason: String,
    },

    /// The input size cannot flow through every down/upsampling stage.
    #[error(
        "Input size {height}x{width} is not divisible by {multiple}; \
         skip connections would not line up"
    )]
    IncompatibleSpatialSize {
        height: usize,
        width: usize,
        /// Required divisor of both spatial dimensions.
        multiple: usize,
    },

    /// Error for when an input tensor has an invalid shape.
    #[error("Invalid input tensor shape: expected {expected}, got {actual}")]
    InvalidTensorShape {
        /// The expected tensor shape.
        expected: String,
        /// The actual tensor shape.
        actual: String,
    },

    /// ImageNet weights only exist for RGB input.
    #[error("Pretrained weights require 3 input channels, got {channels}")]
    PretrainedChannelMismatch {
        /// The configured channel count.
        channels: usize,
    },

    /// No checkpoint could be located.
    #[error("Pretrained weights not found: {path}")]
    WeightsNotFound {
        /// The path or directory that was searched.
        path: String,
    },

    /// Error for when loading model weights fails.
    #[error("Failed to load weights: {reason}")]
    WeightLoadingFailed {
        /// The reason for the weight loading failure.
        reason: String,
    },
}

/// A specialized `Result` type for `DepthNet-Burn` operations.
pub type DepthNetResult<T> = Result<T, DepthNetError>;
