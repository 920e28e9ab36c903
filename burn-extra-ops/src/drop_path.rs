//! # Stochastic depth
//!
//! Randomly drops the residual branch of a block for whole samples of the
//! batch. EfficientNet applies it to every MBConv block that has a skip
//! connection, with a drop probability that grows with depth.

use burn::{prelude::*, tensor::Distribution};

/// Configuration for the `DropPath` module.
#[derive(Config, Debug)]
pub struct DropPathConfig {
    /// Probability of dropping the branch for a sample.
    #[config(default = "0.0")]
    pub drop_prob: f64,
    /// Dropping only happens in training mode.
    #[config(default = "false")]
    pub training: bool,
    /// Rescale surviving samples by `1 / (1 - drop_prob)`.
    #[config(default = "true")]
    pub scale_by_keep: bool,
}

impl DropPathConfig {
    /// Initializes a new `DropPath` module.
    pub const fn init(&self) -> DropPath {
        DropPath {
            drop_prob: self.drop_prob,
            training: self.training,
            scale_by_keep: self.scale_by_keep,
        }
    }
}

/// Per-sample branch dropping ("row" mode stochastic depth).
///
/// Holds no parameters, so its record is empty and checkpoints never need a
/// key for it.
#[derive(Module, Clone, Debug)]
pub struct DropPath {
    drop_prob: f64,
    training: bool,
    scale_by_keep: bool,
}

impl DropPath {
    /// Applies stochastic depth to `x`.
    ///
    /// Outside training, or with a zero probability, `x` is returned as is.
    ///
    /// # Shapes
    /// - input: `[batch_size, ...]`
    /// - output: `[batch_size, ...]`
    pub fn forward<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        if !self.training || self.drop_prob == 0.0 {
            return x;
        }
        let keep_prob = 1.0 - self.drop_prob;

        // One Bernoulli draw per sample, broadcast over the other dims.
        let mut mask_shape = [1; D];
        mask_shape[0] = x.dims()[0];
        let mask = Tensor::random(mask_shape, Distribution::Bernoulli(keep_prob), &x.device());

        if self.scale_by_keep && keep_prob > 0.0 {
            x * mask / keep_prob
        } else {
            x * mask
        }
    }
}
