//! Sensor probe task
//!
//! Brings up the I2C multiplexer and the sensors behind it, then logs a
//! temperature and per-channel current/power reading every
//! `SENSOR_PERIOD_MS`. A sensor that fails to start is skipped; the others
//! keep reporting.

use core::cell::RefCell;

use defmt::*;
use embassy_rp::i2c::Error as I2cError;
use embassy_rp::peripherals::I2C0;
use embassy_time::{Delay, Duration, Ticker};
use fanctl_core::traits::{CurrentSensor, Device, DeviceError, Multiplexer, Thermometer};
use fanctl_drivers::mux::{Pca9546a, Pca9546aConfig};
use fanctl_drivers::sensor::{Ina3221, Ina3221Config, Tmp117, Tmp117Config};
use fanctl_hal::SharedI2c;
use fanctl_hal_rp2040::{Rp2040I2c, Rp2040Output};

use crate::board;

pub type SensorBus = Rp2040I2c<'static, I2C0>;

type Error = DeviceError<I2cError>;

/// Route the bus to `channel`, logging on failure
fn route(mux: &mut dyn Multiplexer<Error = Error>, channel: u8) -> bool {
    match mux.set_channel(1 << channel) {
        Ok(()) => true,
        Err(e) => {
            warn!("PCA9546A: select channel {}: {}", channel, e);
            false
        }
    }
}

fn report_temperature(sensor: &mut dyn Thermometer<Error = Error>) {
    match sensor.read_celsius() {
        Ok(celsius) => info!("TMP117: {} C", celsius),
        Err(e) => warn!("TMP117: {}", e),
    }
}

fn report_power(sensor: &mut dyn CurrentSensor<Error = Error>) {
    for channel in 0..sensor.channel_count() {
        let amps = sensor.read_amps(channel);
        let volts = sensor.read_bus_volts(channel);
        match (amps, volts) {
            (Ok(amps), Ok(volts)) => info!(
                "INA3221 ch{}: {} V {} A {} W",
                channel,
                volts,
                amps,
                amps * volts
            ),
            (Err(e), _) | (_, Err(e)) => warn!("INA3221 ch{}: {}", channel, e),
        }
    }
}

#[embassy_executor::task]
pub async fn sensor_task(bus: &'static RefCell<SensorBus>, mux_reset: Rp2040Output<'static>) {
    let mut mux = Pca9546a::new(
        SharedI2c::new(bus),
        mux_reset,
        Delay,
        Pca9546aConfig {
            address: board::MUX_ADDRESS,
        },
    );
    if let Err(e) = mux.start() {
        error!("PCA9546A not available: {}", e);
        return;
    }

    let mut thermometer = Tmp117::new(
        SharedI2c::new(bus),
        Delay,
        Tmp117Config {
            address: board::TMP117_ADDRESS,
            ..Default::default()
        },
    );
    if route(&mut mux, board::TMP117_CHANNEL) {
        match thermometer.start() {
            Ok(()) => info!("TMP117 found on channel {}", board::TMP117_CHANNEL),
            Err(e) => warn!("TMP117 not available: {}", e),
        }
    }

    let mut current = Ina3221::new(
        SharedI2c::new(bus),
        Delay,
        Ina3221Config {
            address: board::INA3221_ADDRESS,
            shunt_ohms: board::SHUNT_OHMS,
            ..Default::default()
        },
    );
    if route(&mut mux, board::INA3221_CHANNEL) {
        match current.start() {
            Ok(()) => info!("INA3221 found on channel {}", board::INA3221_CHANNEL),
            Err(e) => warn!("INA3221 not available: {}", e),
        }
    }

    if !thermometer.is_ready() && !current.is_ready() {
        warn!("No sensors found, probe task exiting");
        return;
    }

    let mut ticker = Ticker::every(Duration::from_millis(board::SENSOR_PERIOD_MS));
    loop {
        ticker.next().await;

        if thermometer.is_ready() && route(&mut mux, board::TMP117_CHANNEL) {
            report_temperature(&mut thermometer);
        }
        if current.is_ready() && route(&mut mux, board::INA3221_CHANNEL) {
            report_power(&mut current);
        }
    }
}
