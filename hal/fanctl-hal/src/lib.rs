//! fanctl Hardware Abstraction Layer
//!
//! This crate defines the bus and storage traits that chip-specific HALs
//! (RP2040 today) implement, so the drivers and the filesystem service can
//! be written once and tested on the host.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  fanctl-fs / fanctl-drivers             │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  fanctl-hal (this crate - traits)       │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!             ┌───────────────┐
//!             │  fanctl-hal-  │
//!             │    rp2040     │
//!             └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::OutputPin`] - Digital output (chip selects, reset lines)
//! - [`i2c::I2cBus`] - I2C bus operations
//! - [`spi::SpiBus`] - SPI bus operations
//! - [`nor::NorBus`] - Command-framed bus for serial NOR flash
//! - [`block::BlockDevice`] - Block storage contract for filesystems

#![no_std]
#![deny(unsafe_code)]

pub mod block;
pub mod gpio;
pub mod i2c;
pub mod nor;
pub mod spi;

// Re-export key traits at crate root for convenience
pub use block::{BlockDevice, BlockGeometry, IoError};
pub use gpio::{NoPin, OutputPin};
pub use i2c::{I2cBus, SharedI2c};
pub use nor::{Command, Lines, NorBus};
pub use spi::{SpiBus, SpiNorBus, SpiNorError};
