//! I2C bus multiplexers

pub mod pca9546a;

pub use pca9546a::{Pca9546a, Pca9546aConfig};
