//! Device capability traits
//!
//! Every driver implements [`Device`] for its lifecycle plus one
//! capability trait describing what it can do. Callers hold a capability
//! (`&mut dyn Thermometer<Error = _>`, or a generic `F: FlashDevice`)
//! and never name the concrete driver.

pub mod current;
pub mod device;
pub mod flash;
pub mod multiplexer;
pub mod thermometer;

pub use current::CurrentSensor;
pub use device::{Device, DeviceError, DriverState};
pub use flash::{DeviceIdentity, EraseStatus, FlashDevice, FlashError, FlashGeometry};
pub use multiplexer::Multiplexer;
pub use thermometer::Thermometer;
