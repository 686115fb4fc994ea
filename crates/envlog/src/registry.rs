//! Mapping from configured sensor names to hardware.

use crate::error::ResolutionError;
use crate::sensors::{SensorDescriptor, SensorKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How one sensor name maps onto hardware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorEntry {
    pub kind: SensorKind,
    /// I2C address; the kind's default address when absent.
    #[serde(default)]
    pub address: Option<u8>,
    /// Include this sensor in replication.
    #[serde(default = "default_replicate")]
    pub replicate: bool,
}

fn default_replicate() -> bool {
    true
}

impl SensorEntry {
    pub fn new(kind: SensorKind, address: Option<u8>) -> Self {
        Self {
            kind,
            address,
            replicate: default_replicate(),
        }
    }
}

/// Known sensor names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    entries: BTreeMap<String, SensorEntry>,
}

impl Registry {
    /// Registry with the standard deployment names.
    pub fn builtin() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            "cpu".to_string(),
            SensorEntry::new(SensorKind::CpuThermal, None),
        );
        entries.insert(
            "extbme280".to_string(),
            SensorEntry::new(
                SensorKind::PressureHumidityTemp,
                Some(envlog_hw::BME280_PRIMARY_ADDRESS),
            ),
        );
        entries.insert(
            "mntbme280".to_string(),
            SensorEntry::new(
                SensorKind::PressureHumidityTemp,
                Some(envlog_hw::BME280_SECONDARY_ADDRESS),
            ),
        );
        entries.insert(
            "mnttsl2572".to_string(),
            SensorEntry::new(SensorKind::Illuminance, Some(envlog_hw::TSL2572_ADDRESS)),
        );
        Self { entries }
    }

    /// Adds or replaces a name.
    pub fn insert(&mut self, name: &str, entry: SensorEntry) {
        self.entries.insert(name.to_string(), entry);
    }

    /// Returns the registered names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Resolves a configured name to a descriptor.
    pub fn resolve(&self, name: &str) -> Result<SensorDescriptor, ResolutionError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| ResolutionError::UnknownSensor(name.to_string()))?;

        Ok(SensorDescriptor {
            kind: entry.kind,
            name: name.to_string(),
            address: entry.address.or_else(|| entry.kind.default_address()),
            replicate: entry.replicate,
        })
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}
