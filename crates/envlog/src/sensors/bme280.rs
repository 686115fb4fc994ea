//! BME280 source.

use super::{MetricSource, Sample, Values};
use crate::error::HardwareError;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use envlog_hw::Bme280;

/// Samples an identified BME280 in forced mode.
pub struct Bme280Source<I2C, D> {
    sensor: Bme280<I2C, D>,
}

impl<I2C: I2c, D: DelayNs> Bme280Source<I2C, D> {
    /// Probes the chip id and wraps the driver.
    pub fn identify(mut sensor: Bme280<I2C, D>) -> Result<Self, HardwareError> {
        sensor.check_id()?;
        Ok(Self { sensor })
    }
}

impl<I2C: I2c, D: DelayNs> MetricSource for Bme280Source<I2C, D> {
    fn sample(&mut self) -> Result<Sample, HardwareError> {
        let Some(m) = self.sensor.forced()? else {
            return Ok(Sample::NotReady);
        };

        let mut values = Values::new();
        values.insert("Temp".to_string(), m.temperature);
        values.insert("Humi".to_string(), m.humidity);
        values.insert("Pres".to_string(), m.pressure);
        Ok(Sample::Ready(values))
    }
}
