//! SPI master

use embassy_rp::spi::{self, Blocking, Instance, Phase, Polarity, Spi};
use fanctl_hal::spi::{Mode, SpiConfig};
use fanctl_hal::SpiBus;

/// Translate a bus-level [`SpiConfig`] into embassy-rp's
pub fn spi_config(config: &SpiConfig) -> spi::Config {
    let mut out = spi::Config::default();
    out.frequency = config.frequency;
    (out.polarity, out.phase) = match config.mode {
        Mode::Mode0 => (Polarity::IdleLow, Phase::CaptureOnFirstTransition),
        Mode::Mode3 => (Polarity::IdleHigh, Phase::CaptureOnSecondTransition),
    };
    out
}

/// Blocking SPI master
pub struct Rp2040Spi<'d, T: Instance> {
    spi: Spi<'d, T, Blocking>,
}

impl<'d, T: Instance> Rp2040Spi<'d, T> {
    pub fn new(spi: Spi<'d, T, Blocking>) -> Self {
        Self { spi }
    }
}

impl<T: Instance> SpiBus for Rp2040Spi<'_, T> {
    type Error = spi::Error;

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        self.spi.blocking_transfer(read, write)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.spi.blocking_write(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.spi.blocking_read(buf)
    }
}
