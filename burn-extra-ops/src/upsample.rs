//! # Nearest-neighbour upsampling
//!
//! Integer-factor spatial upsampling that replicates every pixel into a
//! `factor x factor` block, the behaviour of a default `UpSampling2D` layer.

use burn::{
    prelude::*,
    tensor::{
        module::interpolate,
        ops::{InterpolateMode, InterpolateOptions},
    },
};

/// Upsample `x` of shape `[batch, channels, height, width]` by `factor`.
pub fn upsample_nearest<B: Backend>(x: Tensor<B, 4>, factor: usize) -> Tensor<B, 4> {
    if factor == 1 {
        return x;
    }
    let [_, _, h, w] = x.dims();
    interpolate(
        x,
        [h * factor, w * factor],
        InterpolateOptions::new(InterpolateMode::Nearest),
    )
}

/// Configuration for [`UpsampleNearest`].
#[derive(Config, Debug)]
pub struct UpsampleNearestConfig {
    /// Scale applied to both spatial dimensions.
    #[config(default = "2")]
    pub factor: usize,
}

impl UpsampleNearestConfig {
    pub const fn init(&self) -> UpsampleNearest {
        UpsampleNearest {
            factor: self.factor,
        }
    }
}

/// Stateless nearest-neighbour upsampling layer.
#[derive(Module, Debug, Clone)]
pub struct UpsampleNearest {
    factor: usize,
}

impl UpsampleNearest {
    pub fn forward<B: Backend>(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        upsample_nearest(x, self.factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn each_pixel_becomes_a_block() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::from_floats([[[[1.0, 2.0], [3.0, 4.0]]]], &device);

        let y = UpsampleNearestConfig::new().init().forward(x);

        assert_eq!(y.dims(), [1, 1, 4, 4]);
        let values = y.into_data().to_vec::<f32>().unwrap();
        assert_eq!(
            values,
            vec![
                1.0, 1.0, 2.0, 2.0, //
                1.0, 1.0, 2.0, 2.0, //
                3.0, 3.0, 4.0, 4.0, //
                3.0, 3.0, 4.0, 4.0,
            ]
        );
    }

    #[test]
    fn factor_one_is_a_no_op() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::ones([2, 3, 5, 7], &device);
        assert_eq!(upsample_nearest(x, 1).dims(), [2, 3, 5, 7]);
    }
}
