//! Error taxonomy for a batch run.
//!
//! Only [`ConfigError`] is fatal. Everything else is scoped to one sensor and
//! ends up in that sensor's record.

use crate::record::{Stage, Status};
use crate::sensors::SensorKind;
use std::path::PathBuf;
use thiserror::Error;

/// Bus or device failure reported by a metric source.
pub type HardwareError = envlog_hw::Error;

/// Configuration could not be loaded or is inconsistent.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read configuration file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML or has wrong types.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The requested profile does not exist.
    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    /// The profile lists no sensors.
    #[error("Profile {0} has an empty sensor list")]
    EmptySensorList(String),

    /// A schema has no columns.
    #[error("Schema for {0} has no columns")]
    EmptySchema(SensorKind),

    /// A column name is not a plain identifier.
    #[error("Invalid column name {column:?} in schema for {kind}")]
    InvalidColumn { kind: SensorKind, column: String },

    /// A column appears twice, or shadows the timestamp column.
    #[error("Duplicate column {column:?} in schema for {kind}")]
    DuplicateColumn { kind: SensorKind, column: String },

    /// The datastore table name is not a plain identifier.
    #[error("Invalid table name {0:?}")]
    InvalidTable(String),
}

/// A configured sensor name could not be mapped to hardware.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// Neither a built-in nor a configured sensor carries this name.
    #[error("Unknown sensor name: {0}")]
    UnknownSensor(String),
}

/// Persisting a reading failed.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The SQLite engine reported an error.
    #[error("SQLite error on {store}: {source}")]
    Sqlite {
        store: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The datastore directory could not be created.
    #[error("Failed to prepare datastore directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Sampled values do not line up with the configured schema.
    #[error("Schema mismatch: columns {expected:?}, values {actual:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },
}

/// Copying a datastore to the remote share failed.
#[derive(Error, Debug)]
pub enum ReplicationError {
    /// There is no local datastore file to copy.
    #[error("Datastore {0} does not exist")]
    MissingSource(PathBuf),

    /// The copy itself failed.
    #[error("Failed to copy to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Error returned by a single lifecycle stage.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error(transparent)]
    Hardware(#[from] HardwareError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Replication(#[from] ReplicationError),

    /// A stage was invoked before the previous one completed.
    #[error("Cannot {stage} while {status}")]
    OutOfOrder { stage: Stage, status: Status },
}
