//! Configuration management.

use crate::error::ConfigError;
use crate::registry::{Registry, SensorEntry};
use crate::replication::ReplicationTarget;
use crate::schema::{SchemaSet, TIMESTAMP_COLUMN};
use crate::sensors::SensorKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding one `<sensor>.sqlite3` file per sensor
    #[serde(default = "default_datastore_dir")]
    pub datastore_dir: PathBuf,

    /// Table name inside every datastore
    #[serde(default = "default_table")]
    pub table: String,

    /// I2C character device
    #[serde(default = "default_i2c_bus")]
    pub i2c_bus: PathBuf,

    /// Sysfs file with the CPU temperature in millidegrees
    #[serde(default = "default_thermal_zone")]
    pub thermal_zone: PathBuf,

    /// Profile used when none is given on the command line
    #[serde(default = "default_profile")]
    pub default_profile: String,

    /// Column names per sensor kind
    #[serde(default)]
    pub schema: SchemaConfig,

    /// Extra or overridden sensor names
    #[serde(default)]
    pub sensors: BTreeMap<String, SensorEntry>,

    /// Named deployments
    #[serde(default = "default_profiles")]
    pub profiles: BTreeMap<String, ProfileConfig>,
}

/// Ordered value columns for each kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default = "default_cpu_columns")]
    pub cpu: Vec<String>,

    #[serde(default = "default_bme280_columns")]
    pub bme280: Vec<String>,

    #[serde(default = "default_tsl2572_columns")]
    pub tsl2572: Vec<String>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            cpu: default_cpu_columns(),
            bme280: default_bme280_columns(),
            tsl2572: default_tsl2572_columns(),
        }
    }
}

/// One deployment: which sensors to sample and where to replicate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Sensor names, sampled in this order
    #[serde(default)]
    pub sensors: Vec<String>,

    /// Per-kind column overrides
    #[serde(default)]
    pub schema: Option<ProfileSchema>,

    /// Remote share; replication is off when absent
    #[serde(default)]
    pub replication: Option<ReplicationTarget>,
}

/// Column overrides; unset kinds use the global `[schema]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileSchema {
    pub cpu: Option<Vec<String>>,
    pub bme280: Option<Vec<String>>,
    pub tsl2572: Option<Vec<String>>,
}

// Default value functions
fn default_datastore_dir() -> PathBuf {
    PathBuf::from("/var/lib/envlog")
}

fn default_table() -> String {
    "condition".to_string()
}

fn default_i2c_bus() -> PathBuf {
    PathBuf::from(envlog_hw::DEFAULT_I2C_BUS)
}

fn default_thermal_zone() -> PathBuf {
    PathBuf::from(envlog_hw::thermal::DEFAULT_THERMAL_ZONE)
}

fn default_profile() -> String {
    "default".to_string()
}

fn default_profiles() -> BTreeMap<String, ProfileConfig> {
    let mut profiles = BTreeMap::new();
    profiles.insert(
        default_profile(),
        ProfileConfig {
            sensors: Registry::builtin().names().map(str::to_string).collect(),
            ..ProfileConfig::default()
        },
    );
    profiles
}

fn columns(kind: SensorKind) -> Vec<String> {
    kind.value_keys().iter().map(|k| k.to_string()).collect()
}

fn default_cpu_columns() -> Vec<String> {
    columns(SensorKind::CpuThermal)
}

fn default_bme280_columns() -> Vec<String> {
    columns(SensorKind::PressureHumidityTemp)
}

fn default_tsl2572_columns() -> Vec<String> {
    columns(SensorKind::Illuminance)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn validate_columns(kind: SensorKind, columns: &[String]) -> Result<(), ConfigError> {
    if columns.is_empty() {
        return Err(ConfigError::EmptySchema(kind));
    }

    let mut seen = HashSet::new();
    for column in columns {
        if !is_identifier(column) {
            return Err(ConfigError::InvalidColumn {
                kind,
                column: column.clone(),
            });
        }
        if column.eq_ignore_ascii_case(TIMESTAMP_COLUMN)
            || !seen.insert(column.to_ascii_lowercase())
        {
            return Err(ConfigError::DuplicateColumn {
                kind,
                column: column.clone(),
            });
        }
    }
    Ok(())
}

/// Everything one batch run needs, resolved and validated.
#[derive(Debug, Clone)]
pub struct RunConfiguration {
    pub profile: String,
    /// Sensor names in run order; duplicates are kept.
    pub sensors: Vec<String>,
    pub schemas: SchemaSet,
    pub registry: Registry,
    pub replication: Option<ReplicationTarget>,
    pub datastore_dir: PathBuf,
    pub table: String,
    pub i2c_bus: PathBuf,
    pub thermal_zone: PathBuf,
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Resolves `profile` (or the default profile) into a run configuration.
    pub fn run_configuration(&self, profile: Option<&str>) -> Result<RunConfiguration, ConfigError> {
        let name = profile.unwrap_or(&self.default_profile);
        let selected = self
            .profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))?;

        if selected.sensors.is_empty() {
            return Err(ConfigError::EmptySensorList(name.to_string()));
        }
        if !is_identifier(&self.table) {
            return Err(ConfigError::InvalidTable(self.table.clone()));
        }

        let overrides = selected.schema.clone().unwrap_or_default();
        let cpu = overrides.cpu.unwrap_or_else(|| self.schema.cpu.clone());
        let bme280 = overrides.bme280.unwrap_or_else(|| self.schema.bme280.clone());
        let tsl2572 = overrides
            .tsl2572
            .unwrap_or_else(|| self.schema.tsl2572.clone());

        validate_columns(SensorKind::CpuThermal, &cpu)?;
        validate_columns(SensorKind::PressureHumidityTemp, &bme280)?;
        validate_columns(SensorKind::Illuminance, &tsl2572)?;

        let mut registry = Registry::builtin();
        for (sensor, entry) in &self.sensors {
            registry.insert(sensor, entry.clone());
        }

        Ok(RunConfiguration {
            profile: name.to_string(),
            sensors: selected.sensors.clone(),
            schemas: SchemaSet::new(cpu, bme280, tsl2572),
            registry,
            replication: selected.replication.clone(),
            datastore_dir: self.datastore_dir.clone(),
            table: self.table.clone(),
            i2c_bus: self.i2c_bus.clone(),
            thermal_zone: self.thermal_zone.clone(),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            datastore_dir: default_datastore_dir(),
            table: default_table(),
            i2c_bus: default_i2c_bus(),
            thermal_zone: default_thermal_zone(),
            default_profile: default_profile(),
            schema: SchemaConfig::default(),
            sensors: BTreeMap::new(),
            profiles: default_profiles(),
        }
    }
}
