//! envlog
//!
//! Samples a configured set of environmental sensors once, appends each
//! reading to a per-sensor SQLite datastore and optionally copies the
//! datastores to a mounted network share.
//!
//! A run is a [`BatchRunner`] driving one [`SensorController`] per configured
//! sensor name. Each controller walks its sensor through identify, sample,
//! persist and replicate; a failure stops that sensor only.

pub mod batch;
pub mod config;
pub mod controller;
pub mod error;
pub mod record;
pub mod registry;
pub mod replication;
pub mod schema;
pub mod sensors;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{BatchReport, BatchRunner, Outcome};
pub use config::{Config, RunConfiguration};
pub use controller::SensorController;
pub use error::{
    ConfigError, HardwareError, LifecycleError, ReplicationError, ResolutionError, StorageError,
};
pub use record::{SensorRecord, Stage, Status};
pub use registry::{Registry, SensorEntry};
pub use replication::{ReplicationTarget, Replicator, ShareReplicator};
pub use schema::{SchemaSet, SchemaTable};
pub use sensors::{
    Hardware, LinuxHardware, MetricSource, Sample, SensorDescriptor, SensorKind, Values,
    ERROR_SENTINEL,
};
pub use storage::{Datastore, Scalar, SqliteStore, StoredRow};
