//! CPU temperature from the Linux thermal sysfs interface.

use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Default thermal zone exposing the SoC temperature.
pub const DEFAULT_THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

/// A thermal zone `temp` file, reported in millidegrees Celsius.
#[derive(Debug, Clone)]
pub struct ThermalZone {
    path: PathBuf,
}

impl ThermalZone {
    /// Creates a reader for the given `temp` file.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Returns the path being read.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the current temperature in °C.
    pub fn read_celsius(&self) -> Result<f64> {
        let content = fs::read_to_string(&self.path).map_err(|source| Error::Sysfs {
            path: self.path.display().to_string(),
            source,
        })?;

        let millidegrees: i64 = content.trim().parse().map_err(|_| Error::Malformed {
            path: self.path.display().to_string(),
            value: content.trim().to_string(),
        })?;

        Ok(millidegrees as f64 / 1000.0)
    }
}

impl Default for ThermalZone {
    fn default() -> Self {
        Self::new(DEFAULT_THERMAL_ZONE)
    }
}
