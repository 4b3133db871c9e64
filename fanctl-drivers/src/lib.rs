//! Hardware driver implementations
//!
//! This crate provides concrete implementations of the capability traits
//! defined in fanctl-core:
//!
//! - Serial NOR flash (Winbond W25Q family) and the block adapter that
//!   puts a filesystem on top of it
//! - I2C bus multiplexer (PCA9546A)
//! - Digital thermometer (TMP117)
//! - Three-channel current monitor (INA3221)
//!
//! With the `sim` feature (and in this crate's own tests) a simulated
//! W25Q chip is available for exercising the storage stack on the host.

#![no_std]
#![deny(unsafe_code)]

#[cfg(any(test, feature = "sim"))]
extern crate std;

#[macro_use]
extern crate fanctl_core;

pub mod flash;
pub mod mux;
pub mod sensor;

#[cfg(any(test, feature = "sim"))]
pub mod sim;
