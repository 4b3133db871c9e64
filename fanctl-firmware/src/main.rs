//! Fan controller firmware
//!
//! Main firmware binary for the RP2040 fan controller board. Brings up the
//! external W25Q flash and its filesystem, the sensor bus, and reports the
//! board identity, then blinks the status LED.

#![no_std]
#![no_main]

use core::cell::RefCell;

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::i2c::I2c;
use embassy_rp::spi::Spi;
use embassy_time::{Delay, Timer};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use fanctl_core::traits::{Device, FlashDevice};
use fanctl_drivers::flash::{BlockConfig, NorBlockDevice, W25q, W25qConfig};
use fanctl_hal::i2c::I2cConfig;
use fanctl_hal::spi::{Mode, SpiConfig};
use fanctl_hal::SpiNorBus;
use fanctl_hal_rp2040::{i2c_config, spi_config, Rp2040I2c, Rp2040Output, Rp2040Spi};

mod board;
mod channels;
mod tasks;

use crate::channels::{FS_MAILBOX, FS_READY};
use crate::tasks::SensorBus;

/// Shared by every driver behind the I2C multiplexer
static SENSOR_BUS: StaticCell<RefCell<SensorBus>> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("fanctl firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let mut led = Output::new(p.PIN_25, Level::Low);

    // External flash on SPI0
    let spi = Spi::new_blocking(
        p.SPI0,
        p.PIN_18,
        p.PIN_19,
        p.PIN_16,
        spi_config(&SpiConfig {
            frequency: board::FLASH_SPI_HZ,
            mode: Mode::Mode0,
        }),
    );
    let cs = Rp2040Output::new(Output::new(p.PIN_17, Level::High));
    let mut flash = W25q::new(
        SpiNorBus::new(Rp2040Spi::new(spi), cs),
        Delay,
        W25qConfig::default(),
    );

    match flash.start() {
        Ok(()) => {
            if let Some(id) = flash.identity() {
                info!(
                    "W25Q: manufacturer {=u8:#04x} type {=u8:#04x} capacity {=u8}",
                    id.manufacturer, id.memory_type, id.capacity
                );
            }
            match NorBlockDevice::new(flash, Delay, BlockConfig::default()) {
                Ok(blocks) => spawner.spawn(tasks::fs_task(blocks)).unwrap(),
                Err(e) => {
                    error!("Flash unusable as block device: {}", e);
                    FS_READY.signal(false);
                }
            }
        }
        Err(e) => {
            error!("W25Q not available: {}", e);
            FS_READY.signal(false);
        }
    }

    // Sensors on I2C0 behind the PCA9546A
    let i2c = I2c::new_blocking(
        p.I2C0,
        p.PIN_5,
        p.PIN_4,
        i2c_config(&I2cConfig {
            frequency: board::I2C_HZ,
        }),
    );
    let sensor_bus = SENSOR_BUS.init(RefCell::new(Rp2040I2c::new(i2c)));
    let mux_reset = Rp2040Output::new(Output::new(p.PIN_6, Level::High));
    spawner
        .spawn(tasks::sensor_task(sensor_bus, mux_reset))
        .unwrap();

    match FS_MAILBOX.client() {
        Some(client) => spawner.spawn(tasks::identity_task(client)).unwrap(),
        None => warn!("No filesystem client slot for identity task"),
    }

    info!("All tasks spawned");

    loop {
        led.toggle();
        Timer::after_millis(500).await;
    }
}
