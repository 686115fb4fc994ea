//! Sensor dispatch for a Linux host.

use super::{
    Bme280Source, CpuThermalSource, Hardware, MetricSource, SensorDescriptor, SensorKind,
    Tsl2572Source,
};
use crate::error::HardwareError;
use envlog_hw::{open_i2c, Bme280, Delay, ThermalZone, Tsl2572};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Opens sensors on a Linux I2C bus and the sysfs thermal zone.
///
/// The bus is opened afresh for each device so no handle outlives the
/// sensor it was opened for.
pub struct LinuxHardware {
    bus: PathBuf,
    thermal_zone: ThermalZone,
}

impl LinuxHardware {
    /// Creates the dispatcher for the given I2C bus device.
    pub fn new<P: AsRef<Path>>(bus: P, thermal_zone: ThermalZone) -> Self {
        Self {
            bus: bus.as_ref().to_path_buf(),
            thermal_zone,
        }
    }
}

fn absent(err: &HardwareError, address: u8) {
    if err.is_no_acknowledge() {
        debug!("No device answering at 0x{:02X}", address);
    }
}

impl Hardware for LinuxHardware {
    fn identify(
        &mut self,
        descriptor: &SensorDescriptor,
    ) -> Result<Box<dyn MetricSource>, HardwareError> {
        match descriptor.kind {
            SensorKind::CpuThermal => {
                debug!("Using thermal zone {}", self.thermal_zone.path().display());
                Ok(Box::new(CpuThermalSource::new(self.thermal_zone.clone())))
            }
            SensorKind::PressureHumidityTemp => {
                let address = descriptor
                    .address
                    .unwrap_or(envlog_hw::BME280_PRIMARY_ADDRESS);
                let i2c = open_i2c(&self.bus)?;
                let source = Bme280Source::identify(Bme280::new(i2c, Delay, address))
                    .inspect_err(|e| absent(e, address))?;
                info!("BME280 0x{:02X} check id: ok", address);
                Ok(Box::new(source))
            }
            SensorKind::Illuminance => {
                let address = descriptor.address.unwrap_or(envlog_hw::TSL2572_ADDRESS);
                let i2c = open_i2c(&self.bus)?;
                let source = Tsl2572Source::identify(Tsl2572::new(i2c, Delay, address))
                    .inspect_err(|e| absent(e, address))?;
                info!("TSL2572 0x{:02X} check id: ok", address);
                Ok(Box::new(source))
            }
        }
    }
}
