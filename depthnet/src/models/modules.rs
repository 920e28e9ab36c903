mod conv_block;
mod decoder_blocks;

pub use conv_block::*;
pub use decoder_blocks::*;
