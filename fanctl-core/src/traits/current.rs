//! Shunt-based current monitor capability

use super::device::Device;

/// Multi-channel current monitor measuring shunt and bus voltage
///
/// Channel indices run from 0 to `channel_count() - 1`.
pub trait CurrentSensor: Device {
    fn channel_count(&self) -> u8;

    /// Volts per raw shunt count
    fn shunt_resolution(&self) -> f32;

    /// Volts per raw bus count
    fn bus_resolution(&self) -> f32;

    /// Shunt resistance in ohms configured for `channel`
    fn shunt_ohms(&self, channel: u8) -> Option<f32>;

    /// Configure shunt resistances, one per channel
    fn set_shunts(&mut self, ohms: &[f32]) -> Result<(), Self::Error>;

    /// Run a conversion and return the raw shunt voltage of `channel`
    fn read_shunt_raw(&mut self, channel: u8) -> Result<i16, Self::Error>;

    /// Run a conversion and return the raw bus voltage of `channel`
    fn read_bus_raw(&mut self, channel: u8) -> Result<i16, Self::Error>;

    fn read_bus_volts(&mut self, channel: u8) -> Result<f32, Self::Error> {
        let raw = self.read_bus_raw(channel)?;
        Ok(raw as f32 * self.bus_resolution())
    }

    fn read_shunt_volts(&mut self, channel: u8) -> Result<f32, Self::Error> {
        let raw = self.read_shunt_raw(channel)?;
        Ok(raw as f32 * self.shunt_resolution())
    }

    /// Current through the shunt of `channel`, in amps
    fn read_amps(&mut self, channel: u8) -> Result<f32, Self::Error>;

    /// Power delivered on `channel`, in watts
    fn read_watts(&mut self, channel: u8) -> Result<f32, Self::Error> {
        let amps = self.read_amps(channel)?;
        let volts = self.read_bus_volts(channel)?;
        Ok(amps * volts)
    }
}
