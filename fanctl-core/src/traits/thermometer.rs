//! Digital thermometer capability

use super::device::Device;

/// Temperature sensor with a signed register reading and a fixed scale
pub trait Thermometer: Device {
    /// Degrees Celsius per raw count
    fn resolution(&self) -> f32;

    /// Run a conversion and return the raw register value
    fn read_raw(&mut self) -> Result<i16, Self::Error>;

    /// Run a conversion and return degrees Celsius
    fn read_celsius(&mut self) -> Result<f32, Self::Error> {
        let raw = self.read_raw()?;
        Ok(raw as f32 * self.resolution())
    }

    /// Program a calibration offset in degrees Celsius
    fn set_offset(&mut self, celsius: f32) -> Result<(), Self::Error>;

    /// Clear the calibration offset
    fn reset_offset(&mut self) -> Result<(), Self::Error> {
        self.set_offset(0.0)
    }
}
