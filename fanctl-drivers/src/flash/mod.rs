//! Serial NOR flash drivers

pub mod block;
pub mod command;
pub mod w25q;

pub use block::{BlockConfig, NorBlockDevice};
pub use w25q::{W25q, W25qConfig};
