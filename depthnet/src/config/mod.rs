//! Configuration module for DepthNet.
//!
//! - `core`: the input declaration shared by every architecture
//! - `enums`: enumeration types used in configurations

pub mod core;
pub mod enums;

pub use self::core::InputShape;
pub use enums::Architecture;
