//! RP2040-specific HAL for the fan controller firmware
//!
//! Implements the `fanctl-hal` bus traits on top of embassy-rp's blocking
//! drivers:
//!
//! - [`Rp2040Spi`]: SPI master, wrapped in `fanctl_hal::SpiNorBus` for the
//!   external NOR flash
//! - [`Rp2040I2c`]: I2C master for the multiplexer and sensors
//! - [`Rp2040Output`]: push-pull output for chip selects and reset lines

#![no_std]

pub mod gpio;
pub mod i2c;
pub mod spi;

pub use gpio::Rp2040Output;
pub use i2c::{i2c_config, Rp2040I2c};
pub use spi::{spi_config, Rp2040Spi};
