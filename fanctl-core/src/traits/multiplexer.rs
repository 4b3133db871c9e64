//! I2C bus multiplexer capability

use super::device::Device;

/// Bus multiplexer routing an upstream bus to a set of downstream channels
///
/// Channels are selected by bitmask, so several can be enabled at once;
/// `0` disconnects every channel.
pub trait Multiplexer: Device {
    /// Number of downstream channels
    fn channel_count(&self) -> u8;

    /// Enable the channels set in `mask`
    fn set_channel(&mut self, mask: u8) -> Result<(), Self::Error>;

    /// Read back the enabled channel mask
    fn channel(&mut self) -> Result<u8, Self::Error>;

    /// Pulse the reset line, disconnecting every channel
    fn reset(&mut self) -> Result<(), Self::Error>;
}
