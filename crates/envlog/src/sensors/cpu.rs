//! CPU temperature source.

use super::{MetricSource, Sample, Values};
use crate::error::HardwareError;
use envlog_hw::{Error, ThermalZone};
use tracing::warn;

/// Reads the SoC temperature from a thermal zone.
pub struct CpuThermalSource {
    zone: ThermalZone,
}

impl CpuThermalSource {
    /// Creates a source for the given zone.
    pub fn new(zone: ThermalZone) -> Self {
        Self { zone }
    }
}

impl MetricSource for CpuThermalSource {
    fn sample(&mut self) -> Result<Sample, HardwareError> {
        match self.zone.read_celsius() {
            Ok(celsius) => {
                let mut values = Values::new();
                values.insert("Temp".to_string(), celsius);
                Ok(Sample::Ready(values))
            }
            // The file exists and was read, it just held no number.
            Err(Error::Malformed { path, value }) => {
                warn!("Thermal zone {} returned {:?}", path, value);
                Ok(Sample::NotReady)
            }
            Err(e) => Err(e),
        }
    }
}
