//! Sensor kinds and the capabilities the lifecycle controller consumes.
//!
//! [`Hardware::identify`] opens and probes the device behind a descriptor and
//! hands back a [`MetricSource`] handle; the handle is then sampled once.

mod bme280;
mod cpu;
mod linux;
mod tsl2572;

pub use bme280::Bme280Source;
pub use cpu::CpuThermalSource;
pub use linux::LinuxHardware;
pub use tsl2572::Tsl2572Source;

use crate::error::HardwareError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Marks a single measurement as unavailable.
///
/// Lies outside every range in [`SensorKind::physical_range`].
pub const ERROR_SENTINEL: f64 = -999.9;

/// Sampled values keyed by value name (`Temp`, `Humi`, `Pres`, `Illu`).
pub type Values = BTreeMap<String, f64>;

/// The supported sensor categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SensorKind {
    /// SoC temperature from the thermal zone.
    #[serde(alias = "cpu")]
    CpuThermal,
    /// BME280 pressure, humidity and temperature.
    #[serde(alias = "bme280")]
    PressureHumidityTemp,
    /// TSL2572 ambient light.
    #[serde(alias = "tsl2572")]
    Illuminance,
}

impl SensorKind {
    /// Value keys produced by one sample, in documentation order.
    pub fn value_keys(&self) -> &'static [&'static str] {
        match self {
            SensorKind::CpuThermal => &["Temp"],
            SensorKind::PressureHumidityTemp => &["Temp", "Humi", "Pres"],
            SensorKind::Illuminance => &["Illu"],
        }
    }

    /// Documented physical range of a value key.
    pub fn physical_range(&self, key: &str) -> Option<RangeInclusive<f64>> {
        match (self, key) {
            (SensorKind::CpuThermal, "Temp") => Some(-40.0..=125.0),
            (SensorKind::PressureHumidityTemp, "Temp") => Some(-40.0..=85.0),
            (SensorKind::PressureHumidityTemp, "Humi") => Some(0.0..=100.0),
            (SensorKind::PressureHumidityTemp, "Pres") => Some(300.0..=1100.0),
            (SensorKind::Illuminance, "Illu") => Some(0.0..=200_000.0),
            _ => None,
        }
    }

    /// Returns true if `value` can be a real measurement for `key`.
    pub fn is_plausible(&self, key: &str, value: f64) -> bool {
        if !value.is_finite() || value == ERROR_SENTINEL {
            return false;
        }
        self.physical_range(key)
            .map_or(true, |range| range.contains(&value))
    }

    /// Bus address used when the configuration does not name one.
    pub fn default_address(&self) -> Option<u8> {
        match self {
            SensorKind::CpuThermal => None,
            SensorKind::PressureHumidityTemp => Some(envlog_hw::BME280_PRIMARY_ADDRESS),
            SensorKind::Illuminance => Some(envlog_hw::TSL2572_ADDRESS),
        }
    }

    /// Values with every documented key set to [`ERROR_SENTINEL`].
    pub fn sentinel_values(&self) -> Values {
        self.value_keys()
            .iter()
            .map(|key| (key.to_string(), ERROR_SENTINEL))
            .collect()
    }
}

impl FromStr for SensorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cpu" | "cpu-thermal" => Ok(SensorKind::CpuThermal),
            "bme280" | "pressure-humidity-temp" => Ok(SensorKind::PressureHumidityTemp),
            "tsl2572" | "illuminance" => Ok(SensorKind::Illuminance),
            _ => Err(format!("unknown sensor kind: {}", s)),
        }
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorKind::CpuThermal => write!(f, "cpu-thermal"),
            SensorKind::PressureHumidityTemp => write!(f, "pressure-humidity-temp"),
            SensorKind::Illuminance => write!(f, "illuminance"),
        }
    }
}

/// One configured sensor instance. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorDescriptor {
    pub kind: SensorKind,
    /// Configured name, also the datastore name.
    pub name: String,
    pub address: Option<u8>,
    /// Whether the datastore is copied to the remote share.
    pub replicate: bool,
}

impl SensorDescriptor {
    /// Returns the configured address, or the kind's default.
    pub fn bus_address(&self) -> Option<u8> {
        self.address.or_else(|| self.kind.default_address())
    }
}

/// Result of one sampling request.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    /// The device produced a reading.
    Ready(Values),
    /// The device answered but had no reading available.
    NotReady,
}

/// An identified device that can be sampled.
pub trait MetricSource {
    /// Requests one reading.
    fn sample(&mut self) -> Result<Sample, HardwareError>;
}

/// Opens and probes the device behind a descriptor.
pub trait Hardware {
    /// Validates that the device answers and returns a handle to sample it.
    fn identify(
        &mut self,
        descriptor: &SensorDescriptor,
    ) -> Result<Box<dyn MetricSource>, HardwareError>;
}
