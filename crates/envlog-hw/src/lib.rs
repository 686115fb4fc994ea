//! envlog Hardware Library
//!
//! Drivers for the environmental sensors sampled by envlog: the Bosch BME280
//! pressure/humidity/temperature sensor, the AMS TSL2572 ambient light sensor
//! and the Linux CPU thermal zone.
//!
//! The I2C drivers are written against the blocking `embedded-hal` 1.0 traits
//! so they can run on any bus; [`open_i2c`] opens a Linux `/dev/i2c-N` device.

pub mod bme280;
pub mod error;
pub mod thermal;
pub mod tsl2572;

#[cfg(test)]
pub(crate) mod mock;

pub use bme280::{Bme280, Measurement};
pub use error::{Error, Result};
pub use thermal::ThermalZone;
pub use tsl2572::Tsl2572;

pub use linux_embedded_hal::{Delay, I2cdev};
use std::path::Path;

/// Default I2C bus on Raspberry Pi class boards.
pub const DEFAULT_I2C_BUS: &str = "/dev/i2c-1";

/// BME280 address with SDO tied to GND.
pub const BME280_PRIMARY_ADDRESS: u8 = 0x76;
/// BME280 address with SDO tied to VDDIO.
pub const BME280_SECONDARY_ADDRESS: u8 = 0x77;
/// TSL2572 fixed address.
pub const TSL2572_ADDRESS: u8 = 0x39;

/// Opens a Linux I2C character device.
pub fn open_i2c<P: AsRef<Path>>(path: P) -> Result<I2cdev> {
    let path = path.as_ref();
    I2cdev::new(path).map_err(|e| Error::BusUnavailable {
        bus: path.display().to_string(),
        reason: e.to_string(),
    })
}
