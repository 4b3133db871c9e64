//! I2C sensor drivers

pub mod ina3221;
pub mod tmp117;

pub use ina3221::{Ina3221, Ina3221Config};
pub use tmp117::{Tmp117, Tmp117Config};
