use burn::{prelude::*, tensor::activation::silu};

/// SiLU (swish) activation as a stateless module.
#[derive(Module, Debug, Clone, Default)]
pub struct Silu;

impl Silu {
    pub const fn new() -> Self {
        Self {}
    }

    pub fn forward<B: Backend, const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        silu(input)
    }
}
