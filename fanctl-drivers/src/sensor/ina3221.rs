//! INA3221 three-channel shunt and bus voltage monitor
//!
//! Measurements are triggered one at a time in single-shot mode with all
//! three channels enabled; the conversion-ready flag in MASK/ENABLE is
//! polled before results are read. Result registers hold a signed value
//! left-aligned by three bits.

use embedded_hal::delay::DelayNs;
use fanctl_core::traits::{CurrentSensor, Device, DeviceError, DriverState};
use fanctl_hal::i2c::I2cBus;

/// INA3221 register addresses
pub mod reg {
    pub const CONFIG: u8 = 0x00;
    pub const MASK_ENABLE: u8 = 0x0F;
    pub const MANUFACTURER_ID: u8 = 0xFE;
    pub const DIE_ID: u8 = 0xFF;

    /// Shunt voltage register of `channel`
    pub const fn shunt(channel: u8) -> u8 {
        0x01 + channel * 2
    }

    /// Bus voltage register of `channel`
    pub const fn bus(channel: u8) -> u8 {
        0x02 + channel * 2
    }
}

pub const CHANNELS: u8 = 3;

/// Volts per shunt count
pub const SHUNT_LSB_VOLTS: f32 = 0.000_04;
/// Volts per bus count
pub const BUS_LSB_VOLTS: f32 = 0.008;

const MANUFACTURER_ID: u16 = 0x5449;
const DIE_ID: u16 = 0x3220;

const CONFIG_SHUNT_CT_SHIFT: u16 = 3;
const CONFIG_BUS_CT_SHIFT: u16 = 6;
const CONFIG_AVG_SHIFT: u16 = 9;
/// CH1EN | CH2EN | CH3EN, shunt and bus single-shot
const CONFIG_CHANNEL_MODE: u16 = (0b111 << 12) | 0b011;
const MASK_EN_CVRF: u16 = 1 << 0;

/// Conversion time, shared by shunt and bus settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConversionTime {
    Us140 = 0,
    Us204 = 1,
    Us332 = 2,
    Us588 = 3,
    Us1100 = 4,
    Us2116 = 5,
    Us4156 = 6,
    Us8244 = 7,
}

/// Samples averaged per result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Averaging {
    X1 = 0,
    X4 = 1,
    X16 = 2,
    X64 = 3,
    X128 = 4,
    X256 = 5,
    X512 = 6,
    X1024 = 7,
}

#[derive(Debug, Clone, Copy)]
pub struct Ina3221Config {
    /// 7-bit address, 0x40-0x43
    pub address: u8,
    pub shunt_conversion: ConversionTime,
    pub bus_conversion: ConversionTime,
    pub averaging: Averaging,
    /// Shunt resistance per channel, ohms
    pub shunt_ohms: [f32; CHANNELS as usize],
    pub poll_interval_ms: u32,
    pub poll_limit: u32,
}

impl Default for Ina3221Config {
    fn default() -> Self {
        Self {
            address: 0x40,
            shunt_conversion: ConversionTime::Us1100,
            bus_conversion: ConversionTime::Us1100,
            averaging: Averaging::X1,
            shunt_ohms: [0.1; CHANNELS as usize],
            poll_interval_ms: 1,
            poll_limit: 50,
        }
    }
}

impl Ina3221Config {
    fn single_shot_word(&self) -> u16 {
        ((self.shunt_conversion as u16) << CONFIG_SHUNT_CT_SHIFT)
            | ((self.bus_conversion as u16) << CONFIG_BUS_CT_SHIFT)
            | ((self.averaging as u16) << CONFIG_AVG_SHIFT)
            | CONFIG_CHANNEL_MODE
    }
}

/// INA3221 driver
pub struct Ina3221<I, D> {
    bus: I,
    delay: D,
    config: Ina3221Config,
    state: DriverState,
}

impl<I: I2cBus, D: DelayNs> Ina3221<I, D> {
    pub fn new(bus: I, delay: D, config: Ina3221Config) -> Self {
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

    fn probe(&mut self) -> Result<bool, I::Error> {
        let manufacturer = self.read_register(reg::MANUFACTURER_ID)?;
        let die = self.read_register(reg::DIE_ID)?;
        Ok(manufacturer == MANUFACTURER_ID && die == DIE_ID)
    }

    /// Trigger a single-shot conversion, wait for it, read `result_reg`
    fn measure(&mut self, channel: u8, result_reg: u8) -> Result<i16, DeviceError<I::Error>> {
        if !self.state.is_ready() {
            return Err(DeviceError::NotReady);
        }
        if channel >= CHANNELS {
            return Err(DeviceError::InvalidArgument);
        }

        self.bus.acquire()?;
        let result = self.convert_and_read(result_reg);
        self.bus.release();
        result
    }

    fn convert_and_read(&mut self, result_reg: u8) -> Result<i16, DeviceError<I::Error>> {
        self.write_register(reg::CONFIG, self.config.single_shot_word())?;

        for _ in 0..self.config.poll_limit {
            self.delay.delay_ms(self.config.poll_interval_ms);
            if self.read_register(reg::MASK_ENABLE)? & MASK_EN_CVRF != 0 {
                let raw = self.read_register(result_reg)? as i16;
                return Ok(raw >> 3);
            }
        }
        log_warn!("ina3221: conversion timed out");
        Err(DeviceError::Timeout)
    }
}

impl<I: I2cBus, D: DelayNs> Device for Ina3221<I, D> {
    type Error = DeviceError<I::Error>;

    fn start(&mut self) -> Result<(), Self::Error> {
        if self.state == DriverState::Ready {
            return Ok(());
        }

        self.bus.acquire()?;
        let found = self.probe();
        self.bus.release();

        if let Ok(true) = found {
            log_info!("ina3221: ready at {=u8:#x}", self.config.address);
            self.state = DriverState::Ready;
            Ok(())
        } else {
            log_warn!("ina3221: not found at {=u8:#x}", self.config.address);
            self.state = DriverState::NotFound;
            Err(DeviceError::NotFound)
        }
    }

    fn stop(&mut self) {
        self.state = DriverState::Stopped;
    }

    fn state(&self) -> DriverState {
        self.state
    }
}

impl<I: I2cBus, D: DelayNs> CurrentSensor for Ina3221<I, D> {
    fn channel_count(&self) -> u8 {
        CHANNELS
    }

    fn shunt_resolution(&self) -> f32 {
        SHUNT_LSB_VOLTS
    }

    fn bus_resolution(&self) -> f32 {
        BUS_LSB_VOLTS
    }

    fn shunt_ohms(&self, channel: u8) -> Option<f32> {
        self.config.shunt_ohms.get(channel as usize).copied()
    }

    fn set_shunts(&mut self, ohms: &[f32]) -> Result<(), Self::Error> {
        if ohms.len() != CHANNELS as usize || ohms.iter().any(|&r| !(r > 0.0)) {
            return Err(DeviceError::InvalidArgument);
        }
        self.config.shunt_ohms.copy_from_slice(ohms);
        Ok(())
    }

    fn read_shunt_raw(&mut self, channel: u8) -> Result<i16, Self::Error> {
        self.measure(channel, reg::shunt(channel))
    }

    fn read_bus_raw(&mut self, channel: u8) -> Result<i16, Self::Error> {
        self.measure(channel, reg::bus(channel))
    }

    fn read_amps(&mut self, channel: u8) -> Result<f32, Self::Error> {
        let ohms = self.shunt_ohms(channel).ok_or(DeviceError::InvalidArgument)?;
        let volts = self.read_shunt_volts(channel)?;
        Ok(volts / ohms)
    }
}
