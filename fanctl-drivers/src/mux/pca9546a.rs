//! PCA9546A four-channel I2C switch
//!
//! The part has a single control register: each of the low four bits
//! connects one downstream channel. It is read and written without a
//! register address byte.

use embedded_hal::delay::DelayNs;
use fanctl_core::traits::{Device, DeviceError, DriverState, Multiplexer};
use fanctl_hal::gpio::OutputPin;
use fanctl_hal::i2c::I2cBus;

pub const CHANNELS: u8 = 4;

/// Lowest and highest strap addresses
pub const ADDRESS_MIN: u8 = 0x70;
pub const ADDRESS_MAX: u8 = 0x77;

/// Reset pulse width and recovery time
const RESET_PULSE_MS: u32 = 1;

#[derive(Debug, Clone, Copy)]
pub struct Pca9546aConfig {
    /// 7-bit address, 0x70-0x77
    pub address: u8,
}

impl Default for Pca9546aConfig {
    fn default() -> Self {
        Self {
            address: ADDRESS_MIN,
        }
    }
}

/// PCA9546A driver
///
/// `P` is the active-low reset line; use [`fanctl_hal::NoPin`] when it is
/// not wired.
pub struct Pca9546a<I, P, D> {
    bus: I,
    reset_pin: P,
    delay: D,
    config: Pca9546aConfig,
    state: DriverState,
}

impl<I: I2cBus, P: OutputPin, D: DelayNs> Pca9546a<I, P, D> {
    pub fn new(bus: I, mut reset_pin: P, delay: D, config: Pca9546aConfig) -> Self {
        reset_pin.set_high();
        Self {
            bus,
            reset_pin,
            delay,
            config,
            state: DriverState::Stopped,
        }
    }

    fn read_control(&mut self) -> Result<u8, I::Error> {
        let mut value = [0u8; 1];
        self.bus.read(self.config.address, &mut value)?;
        Ok(value[0])
    }

    fn pulse_reset(&mut self) {
        self.reset_pin.set_low();
        self.delay.delay_ms(RESET_PULSE_MS);
        self.reset_pin.set_high();
        self.delay.delay_ms(RESET_PULSE_MS);
    }

    /// Control register value, `None` if unreadable or not a valid mask
    fn probe(&mut self) -> Option<u8> {
        match self.read_control() {
            Ok(mask) if mask < 1 << CHANNELS => Some(mask),
            _ => None,
        }
    }

    fn ensure_ready(&self) -> Result<(), DeviceError<I::Error>> {
        if self.state.is_ready() {
            Ok(())
        } else {
            Err(DeviceError::NotReady)
        }
    }
}

impl<I: I2cBus, P: OutputPin, D: DelayNs> Device for Pca9546a<I, P, D> {
    type Error = DeviceError<I::Error>;

    fn start(&mut self) -> Result<(), Self::Error> {
        if self.state == DriverState::Ready {
            return Ok(());
        }
        if !(ADDRESS_MIN..=ADDRESS_MAX).contains(&self.config.address) {
            return Err(DeviceError::InvalidArgument);
        }

        self.bus.acquire()?;
        let mut found = self.probe();
        if found.is_none() {
            self.pulse_reset();
            found = self.probe();
        }
        self.bus.release();

        match found {
            Some(mask) => {
                log_info!("pca9546a: ready at {=u8:#x}, mask {=u8:#x}", self.config.address, mask);
                self.state = DriverState::Ready;
                Ok(())
            }
            None => {
                log_warn!("pca9546a: not found at {=u8:#x}", self.config.address);
                self.state = DriverState::NotFound;
                Err(DeviceError::NotFound)
            }
        }
    }

    fn stop(&mut self) {
        self.state = DriverState::Stopped;
    }

    fn state(&self) -> DriverState {
        self.state
    }
}

impl<I: I2cBus, P: OutputPin, D: DelayNs> Multiplexer for Pca9546a<I, P, D> {
    fn channel_count(&self) -> u8 {
        CHANNELS
    }

    fn set_channel(&mut self, mask: u8) -> Result<(), Self::Error> {
        self.ensure_ready()?;
        if mask >= 1 << CHANNELS {
            return Err(DeviceError::InvalidArgument);
        }

        self.bus.acquire()?;
        let result = self.bus.write(self.config.address, &[mask]);
        self.bus.release();
        Ok(result?)
    }

    fn channel(&mut self) -> Result<u8, Self::Error> {
        self.ensure_ready()?;

        self.bus.acquire()?;
        let result = self.read_control();
        self.bus.release();
        Ok(result?)
    }

    fn reset(&mut self) -> Result<(), Self::Error> {
        self.ensure_ready()?;

        self.bus.acquire()?;
        self.pulse_reset();
        self.bus.release();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimDelay;
    use core::cell::Cell;

    /// Single control register; a garbage value is reported until reset
    struct MockSwitch {
        address: u8,
        control: u8,
        garbage_until_reset: bool,
        present: bool,
        held: bool,
    }

    impl MockSwitch {
        fn new() -> Self {
            Self {
                address: 0x70,
                control: 0,
                garbage_until_reset: false,
                present: true,
                held: false,
            }
        }
    }

    #[derive(Debug, PartialEq)]
    struct Nack;

    impl I2cBus for MockSwitch {
        type Error = Nack;

        fn acquire(&mut self) -> Result<(), Nack> {
            assert!(!self.held, "bus acquired twice");
            self.held = true;
            Ok(())
        }

        fn release(&mut self) {
            self.held = false;
        }

        fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Nack> {
            if !self.present || address != self.address {
                return Err(Nack);
            }
            self.control = data[0];
            Ok(())
        }

        fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Nack> {
            if !self.present || address != self.address {
                return Err(Nack);
            }
            buf[0] = if self.garbage_until_reset { 0xFF } else { self.control };
            Ok(())
        }

        fn write_read(&mut self, _: u8, _: &[u8], _: &mut [u8]) -> Result<(), Nack> {
            Err(Nack)
        }
    }

    /// Reset line that clears the switch's garbage state on a low pulse
    struct ResetLine<'a> {
        pulses: &'a Cell<u32>,
    }

    impl OutputPin for ResetLine<'_> {
        fn set_high(&mut self) {}

        fn set_low(&mut self) {
            self.pulses.set(self.pulses.get() + 1);
        }
    }

    #[test]
    fn test_start_ready() {
        let mut bus = MockSwitch::new();
        let pulses = Cell::new(0);
        let mut mux = Pca9546a::new(
            &mut bus,
            ResetLine { pulses: &pulses },
            SimDelay::default(),
            Pca9546aConfig::default(),
        );

        assert_eq!(mux.state(), DriverState::Stopped);
        mux.start().unwrap();
        assert_eq!(mux.state(), DriverState::Ready);
        assert_eq!(mux.channel_count(), 4);
        assert_eq!(pulses.get(), 0);
    }

    #[test]
    fn test_start_absent_is_not_found() {
        let mut bus = MockSwitch::new();
        bus.present = false;
        let pulses = Cell::new(0);
        let mut mux = Pca9546a::new(
            &mut bus,
            ResetLine { pulses: &pulses },
            SimDelay::default(),
            Pca9546aConfig::default(),
        );

        assert_eq!(mux.start(), Err(DeviceError::NotFound));
        assert_eq!(mux.state(), DriverState::NotFound);
        // one reset attempt before giving up
        assert_eq!(pulses.get(), 1);
        assert_eq!(mux.set_channel(1), Err(DeviceError::NotReady));
    }

    #[test]
    fn test_invalid_control_value_stays_not_found() {
        let mut bus = MockSwitch::new();
        bus.garbage_until_reset = true;
        let mut mux = Pca9546a::new(&mut bus, fanctl_hal::NoPin, SimDelay::default(), Pca9546aConfig::default());
        assert_eq!(mux.start(), Err(DeviceError::NotFound));
    }

    #[test]
    fn test_address_out_of_range() {
        let mut bus = MockSwitch::new();
        let mut mux = Pca9546a::new(
            &mut bus,
            fanctl_hal::NoPin,
            SimDelay::default(),
            Pca9546aConfig { address: 0x48 },
        );
        assert_eq!(mux.start(), Err(DeviceError::InvalidArgument));
    }

    #[test]
    fn test_set_channel_round_trip_every_channel() {
        let mut bus = MockSwitch::new();
        let mut mux = Pca9546a::new(&mut bus, fanctl_hal::NoPin, SimDelay::default(), Pca9546aConfig::default());
        mux.start().unwrap();

        let dynamic: &mut dyn Multiplexer<Error = DeviceError<Nack>> = &mut mux;
        for i in 0..dynamic.channel_count() {
            dynamic.set_channel(1 << i).unwrap();
            assert_eq!(dynamic.channel().unwrap(), 1 << i);
        }
    }

    #[test]
    fn test_set_channel_rejects_wide_mask() {
        let mut bus = MockSwitch::new();
        let mut mux = Pca9546a::new(&mut bus, fanctl_hal::NoPin, SimDelay::default(), Pca9546aConfig::default());
        mux.start().unwrap();
        assert_eq!(mux.set_channel(1 << 4), Err(DeviceError::InvalidArgument));
    }

    #[test]
    fn test_reset_pulses_line() {
        let mut bus = MockSwitch::new();
        let pulses = Cell::new(0);
        let mut mux = Pca9546a::new(
            &mut bus,
            ResetLine { pulses: &pulses },
            SimDelay::default(),
            Pca9546aConfig::default(),
        );
        mux.start().unwrap();
        mux.reset().unwrap();
        assert_eq!(pulses.get(), 1);
    }

    #[test]
    fn test_stop_and_restart() {
        let mut bus = MockSwitch::new();
        let mut mux = Pca9546a::new(&mut bus, fanctl_hal::NoPin, SimDelay::default(), Pca9546aConfig::default());
        mux.start().unwrap();
        mux.stop();
        mux.stop();
        assert_eq!(mux.state(), DriverState::Stopped);
        assert_eq!(mux.channel(), Err(DeviceError::NotReady));
        mux.start().unwrap();
        assert_eq!(mux.state(), DriverState::Ready);
    }
}
