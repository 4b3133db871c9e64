//! Board-agnostic core of the fan controller firmware
//!
//! This crate holds everything that does not touch hardware:
//!
//! - Device capability traits (flash, multiplexer, thermometer, current
//!   sensor) and the lifecycle every driver shares
//! - Filesystem request/response types spoken between callers and the
//!   filesystem actor
//! - The board identity record
//! - Logging macros that compile to defmt or to nothing

#![no_std]
#![deny(unsafe_code)]

#[macro_use]
pub mod log;

pub mod fs;
pub mod identity;
pub mod traits;

pub use identity::Identity;
