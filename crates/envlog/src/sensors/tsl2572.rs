//! TSL2572 source.

use super::{MetricSource, Sample, Values};
use crate::error::HardwareError;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use envlog_hw::Tsl2572;

/// Samples an identified TSL2572 with automatic gain.
pub struct Tsl2572Source<I2C, D> {
    sensor: Tsl2572<I2C, D>,
}

impl<I2C: I2c, D: DelayNs> Tsl2572Source<I2C, D> {
    /// Probes the chip id and wraps the driver.
    pub fn identify(mut sensor: Tsl2572<I2C, D>) -> Result<Self, HardwareError> {
        sensor.check_id()?;
        Ok(Self { sensor })
    }
}

impl<I2C: I2c, D: DelayNs> MetricSource for Tsl2572Source<I2C, D> {
    fn sample(&mut self) -> Result<Sample, HardwareError> {
        match self.sensor.single_auto_measure()? {
            Some(lux) => {
                let mut values = Values::new();
                values.insert("Illu".to_string(), lux);
                Ok(Sample::Ready(values))
            }
            None => Ok(Sample::NotReady),
        }
    }
}
