//! Scripted hardware and in-memory backends for unit tests.

use crate::error::{HardwareError, ReplicationError, StorageError};
use crate::replication::Replicator;
use crate::sensors::{Hardware, MetricSource, Sample, SensorDescriptor, SensorKind, Values};
use crate::storage::{Datastore, Scalar};
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

pub fn bme280(name: &str) -> SensorDescriptor {
    SensorDescriptor {
        kind: SensorKind::PressureHumidityTemp,
        name: name.to_string(),
        address: Some(0x76),
        replicate: true,
    }
}

pub fn reading(pairs: &[(&str, f64)]) -> Values {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// What a scripted device does.
#[derive(Debug, Clone)]
pub enum Script {
    /// Does not acknowledge its address.
    Absent,
    Ready(Values),
    NotReady,
    /// Identifies, then fails the transfer.
    SampleError,
}

pub struct FakeHardware {
    default: Script,
    overrides: BTreeMap<String, Script>,
    pub identified: Vec<String>,
}

impl FakeHardware {
    pub fn new(default: Script) -> Self {
        Self {
            default,
            overrides: BTreeMap::new(),
            identified: Vec::new(),
        }
    }

    pub fn with(mut self, name: &str, script: Script) -> Self {
        self.overrides.insert(name.to_string(), script);
        self
    }
}

fn nack(address: u8) -> HardwareError {
    HardwareError::I2c {
        address,
        kind: ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
    }
}

impl Hardware for FakeHardware {
    fn identify(
        &mut self,
        descriptor: &SensorDescriptor,
    ) -> Result<Box<dyn MetricSource>, HardwareError> {
        self.identified.push(descriptor.name.clone());
        let script = self
            .overrides
            .get(&descriptor.name)
            .unwrap_or(&self.default)
            .clone();
        match script {
            Script::Absent => Err(nack(descriptor.bus_address().unwrap_or(0))),
            script => Ok(Box::new(FakeSource {
                script,
                address: descriptor.bus_address().unwrap_or(0),
            })),
        }
    }
}

struct FakeSource {
    script: Script,
    address: u8,
}

impl MetricSource for FakeSource {
    fn sample(&mut self) -> Result<Sample, HardwareError> {
        match &self.script {
            Script::Ready(values) => Ok(Sample::Ready(values.clone())),
            Script::NotReady => Ok(Sample::NotReady),
            Script::SampleError => Err(HardwareError::I2c {
                address: self.address,
                kind: ErrorKind::Bus,
            }),
            Script::Absent => Err(nack(self.address)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    EnsureTable(String, Vec<String>),
    AppendRow(String),
}

#[derive(Default)]
pub struct MemoryStore {
    fail: bool,
    calls: RefCell<Vec<Call>>,
    rows: RefCell<BTreeMap<String, Vec<Vec<Scalar>>>>,
}

impl MemoryStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn rows(&self, store: &str) -> Vec<Vec<Scalar>> {
        self.rows.borrow().get(store).cloned().unwrap_or_default()
    }

    fn check(&self, store: &str) -> Result<(), StorageError> {
        if self.fail {
            return Err(StorageError::Io {
                path: self.path(store),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        Ok(())
    }
}

impl Datastore for MemoryStore {
    fn ensure_table(&self, store: &str, columns: &[String]) -> Result<(), StorageError> {
        self.check(store)?;
        self.calls
            .borrow_mut()
            .push(Call::EnsureTable(store.to_string(), columns.to_vec()));
        Ok(())
    }

    fn append_row(&self, store: &str, row: &[Scalar]) -> Result<(), StorageError> {
        self.check(store)?;
        self.calls
            .borrow_mut()
            .push(Call::AppendRow(store.to_string()));
        self.rows
            .borrow_mut()
            .entry(store.to_string())
            .or_default()
            .push(row.to_vec());
        Ok(())
    }

    fn path(&self, store: &str) -> PathBuf {
        PathBuf::from(format!("{}.sqlite3", store))
    }
}

#[derive(Default)]
pub struct RecordingReplicator {
    fail: bool,
    uploads: RefCell<Vec<String>>,
}

impl RecordingReplicator {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.borrow().clone()
    }
}

impl Replicator for RecordingReplicator {
    fn upload(&self, _local: &Path, remote: &str) -> Result<(), ReplicationError> {
        if self.fail {
            return Err(ReplicationError::Io {
                path: PathBuf::from(remote),
                source: io::Error::new(io::ErrorKind::NotConnected, "share unreachable"),
            });
        }
        self.uploads.borrow_mut().push(remote.to_string());
        Ok(())
    }
}
