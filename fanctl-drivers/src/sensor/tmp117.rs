//! TMP117 digital thermometer
//!
//! Runs in one-shot mode: each reading writes the configuration register
//! to start a conversion, waits for DATA_READY, then reads the result.
//! Registers are 16-bit big-endian.

use embedded_hal::delay::DelayNs;
use fanctl_core::traits::{Device, DeviceError, DriverState, Thermometer};
use fanctl_hal::i2c::I2cBus;

/// TMP117 register addresses
pub mod reg {
    pub const TEMP_RESULT: u8 = 0x00;
    pub const CONFIG: u8 = 0x01;
    pub const TEMP_OFFSET: u8 = 0x07;
    pub const DEVICE_ID: u8 = 0x0F;
}

/// Degrees Celsius per count of the result and offset registers
pub const LSB_CELSIUS: f32 = 0.0078125;

/// Device id, low 12 bits of DEVICE_ID (top bits are the revision)
const DEVICE_ID: u16 = 0x0117;
const DEVICE_ID_MASK: u16 = 0x0FFF;

const CONFIG_AVG_SHIFT: u16 = 5;
const CONFIG_CONV_SHIFT: u16 = 7;
/// MOD[1:0] = 11, one-shot conversion
const CONFIG_ONE_SHOT: u16 = (1 << 10) | (1 << 11);
const CONFIG_DATA_READY: u16 = 1 << 13;

/// Conversion averaging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Averaging {
    Single = 0,
    X8 = 1,
    X32 = 2,
    X64 = 3,
}

/// Conversion cycle time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleTime {
    Ms15_5 = 0,
    Ms125 = 1,
    Ms250 = 2,
    Ms500 = 3,
    Ms1000 = 4,
    Ms4000 = 5,
    Ms8000 = 6,
    Ms16000 = 7,
}

#[derive(Debug, Clone, Copy)]
pub struct Tmp117Config {
    /// 7-bit address, 0x48-0x4B
    pub address: u8,
    pub averaging: Averaging,
    pub cycle_time: CycleTime,
    /// Delay between DATA_READY polls
    pub poll_interval_ms: u32,
    /// Polls before a conversion is declared stuck
    pub poll_limit: u32,
}

impl Default for Tmp117Config {
    fn default() -> Self {
        Self {
            address: 0x48,
            averaging: Averaging::X8,
            cycle_time: CycleTime::Ms15_5,
            poll_interval_ms: 5,
            // 8 averages take 125 ms
            poll_limit: 100,
        }
    }
}

impl Tmp117Config {
    fn one_shot_word(&self) -> u16 {
        ((self.averaging as u16) << CONFIG_AVG_SHIFT)
            | ((self.cycle_time as u16) << CONFIG_CONV_SHIFT)
            | CONFIG_ONE_SHOT
    }
}

/// Convert degrees Celsius to offset register counts, rounding to nearest
fn celsius_to_counts(celsius: f32) -> i16 {
    let scaled = celsius / LSB_CELSIUS;
    let rounded = if scaled >= 0.0 { scaled + 0.5 } else { scaled - 0.5 };
    // float to int casts saturate
    rounded as i16
}

/// TMP117 driver
pub struct Tmp117<I, D> {
    bus: I,
    delay: D,
    config: Tmp117Config,
    state: DriverState,
}

impl<I: I2cBus, D: DelayNs> Tmp117<I, D> {
    pub fn new(bus: I, delay: D, config: Tmp117Config) -> Self {
        Self {
            bus,
            delay,
            config,
            state: DriverState::Stopped,
        }
    }

    fn read_register(&mut self, reg: u8) -> Result<u16, I::Error> {
        let mut buf = [0u8; 2];
        self.bus.write_read(self.config.address, &[reg], &mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    fn write_register(&mut self, reg: u8, value: u16) -> Result<(), I::Error> {
        let [hi, lo] = value.to_be_bytes();
        self.bus.write(self.config.address, &[reg, hi, lo])
    }

    /// Start a one-shot conversion and wait for its result
    fn convert(&mut self) -> Result<i16, DeviceError<I::Error>> {
        self.write_register(reg::CONFIG, self.config.one_shot_word())?;

        for _ in 0..self.config.poll_limit {
            self.delay.delay_ms(self.config.poll_interval_ms);
            if self.read_register(reg::CONFIG)? & CONFIG_DATA_READY != 0 {
                return Ok(self.read_register(reg::TEMP_RESULT)? as i16);
            }
        }
        log_warn!("tmp117: conversion timed out");
        Err(DeviceError::Timeout)
    }

    /// Run `op` with the bus held; refuses unless Ready
    fn transaction<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, DeviceError<I::Error>>,
    ) -> Result<T, DeviceError<I::Error>> {
        if !self.state.is_ready() {
            return Err(DeviceError::NotReady);
        }
        self.bus.acquire()?;
        let result = op(self);
        self.bus.release();
        result
    }
}

impl<I: I2cBus, D: DelayNs> Device for Tmp117<I, D> {
    type Error = DeviceError<I::Error>;

    fn start(&mut self) -> Result<(), Self::Error> {
        if self.state == DriverState::Ready {
            return Ok(());
        }

        self.bus.acquire()?;
        let id = self.read_register(reg::DEVICE_ID);
        self.bus.release();

        match id {
            Ok(id) if id & DEVICE_ID_MASK == DEVICE_ID => {
                log_info!("tmp117: ready at {=u8:#x}, rev {=u16}", self.config.address, id >> 12);
                self.state = DriverState::Ready;
                Ok(())
            }
            _ => {
                log_warn!("tmp117: not found at {=u8:#x}", self.config.address);
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

impl<I: I2cBus, D: DelayNs> Thermometer for Tmp117<I, D> {
    fn resolution(&self) -> f32 {
        LSB_CELSIUS
    }

    fn read_raw(&mut self) -> Result<i16, Self::Error> {
        self.transaction(|dev| dev.convert())
    }

    fn set_offset(&mut self, celsius: f32) -> Result<(), Self::Error> {
        let counts = celsius_to_counts(celsius);
        self.transaction(|dev| Ok(dev.write_register(reg::TEMP_OFFSET, counts as u16)?))
    }
}
