//! Lifecycle of one sensor: identify, sample, persist, replicate.
//!
//! Stages run strictly in order. A hard failure moves the record to
//! `Failed(stage)` and nothing after it runs. A device that answers but has
//! no reading is not a failure: its values are set to the error sentinel and
//! the row is still stored, so the history shows a gap instead of nothing.

use crate::error::LifecycleError;
use crate::record::{SensorRecord, Stage, Status};
use crate::replication::Replicator;
use crate::schema::SchemaTable;
use crate::sensors::{Hardware, MetricSource, Sample, SensorDescriptor, Values, ERROR_SENTINEL};
use crate::storage::Datastore;
use chrono::Local;
use tracing::{debug, error, info, info_span, warn};

/// Drives one [`SensorRecord`] through its lifecycle.
pub struct SensorController<'a> {
    record: SensorRecord,
    schema: &'a SchemaTable,
    source: Option<Box<dyn MetricSource>>,
}

impl<'a> SensorController<'a> {
    /// Creates a controller for `descriptor`, persisting with `schema`.
    pub fn new(descriptor: SensorDescriptor, schema: &'a SchemaTable) -> Self {
        Self {
            record: SensorRecord::new(descriptor),
            schema,
            source: None,
        }
    }

    /// Returns the record in its current state.
    pub fn record(&self) -> &SensorRecord {
        &self.record
    }

    /// Runs every stage and returns the final record.
    ///
    /// Replication only happens when a replicator is given and the sensor
    /// has not opted out.
    pub fn run(
        mut self,
        hardware: &mut dyn Hardware,
        store: &dyn Datastore,
        replicator: Option<&dyn Replicator>,
    ) -> SensorRecord {
        let span = info_span!(
            "sensor",
            name = %self.record.name(),
            kind = %self.record.descriptor.kind
        );
        let _enter = span.enter();

        // the failing stage has already recorded and logged its error
        if let Err(e) = self.lifecycle(hardware, store, replicator) {
            debug!("Lifecycle stopped: {}", e);
        }
        self.record
    }

    fn lifecycle(
        &mut self,
        hardware: &mut dyn Hardware,
        store: &dyn Datastore,
        replicator: Option<&dyn Replicator>,
    ) -> Result<(), LifecycleError> {
        self.identify(hardware)?;
        self.sample()?;
        self.persist(store)?;

        match replicator {
            Some(replicator) if self.record.descriptor.replicate => {
                self.replicate(store, replicator)
            }
            Some(_) => {
                debug!("Replication disabled for {}", self.record.name());
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Opens and probes the device.
    pub fn identify(&mut self, hardware: &mut dyn Hardware) -> Result<(), LifecycleError> {
        self.require(Status::Pending, Stage::Identify)?;

        match hardware.identify(&self.record.descriptor) {
            Ok(source) => {
                self.source = Some(source);
                self.record.advance(Stage::Identify);
                info!(
                    sensor = %self.record.name(),
                    stage = %Stage::Identify,
                    "Identified {}",
                    self.record.descriptor.kind
                );
                Ok(())
            }
            Err(e) => Err(self.fail(Stage::Identify, e.into())),
        }
    }

    /// Takes one reading and timestamps it.
    pub fn sample(&mut self) -> Result<(), LifecycleError> {
        self.require(Status::Identified, Stage::Sample)?;
        let Some(source) = self.source.as_mut() else {
            return Err(self.out_of_order(Stage::Sample));
        };

        let timestamp = Local::now().naive_local();
        let values = match source.sample() {
            Ok(Sample::Ready(values)) => self.screen(values),
            Ok(Sample::NotReady) => {
                self.warning(format!(
                    "Sensor {} did not function properly",
                    self.record.name()
                ));
                self.record.descriptor.kind.sentinel_values()
            }
            Err(e) => return Err(self.fail(Stage::Sample, e.into())),
        };

        self.record.values = values;
        self.record.timestamp = Some(timestamp);
        self.record.advance(Stage::Sample);
        info!(
            sensor = %self.record.name(),
            stage = %Stage::Sample,
            "Sampled {:?}",
            self.record.values
        );
        Ok(())
    }

    /// Appends the reading to the sensor's datastore.
    pub fn persist(&mut self, store: &dyn Datastore) -> Result<(), LifecycleError> {
        self.require(Status::Sampled, Stage::Persist)?;
        let Some(timestamp) = self.record.timestamp else {
            return Err(self.out_of_order(Stage::Persist));
        };

        let name = self.record.name();
        let result = self
            .schema
            .row(&timestamp, &self.record.values)
            .and_then(|row| {
                store.ensure_table(name, &self.schema.layout())?;
                store.append_row(name, &row)
            });

        match result {
            Ok(()) => {
                self.record.advance(Stage::Persist);
                info!(
                    sensor = %self.record.name(),
                    stage = %Stage::Persist,
                    "Store {}: {:?}",
                    store.path(self.record.name()).display(),
                    self.record.values
                );
                Ok(())
            }
            Err(e) => Err(self.fail(Stage::Persist, e.into())),
        }
    }

    /// Copies the datastore to the remote share.
    pub fn replicate(
        &mut self,
        store: &dyn Datastore,
        replicator: &dyn Replicator,
    ) -> Result<(), LifecycleError> {
        self.require(Status::Persisted, Stage::Replicate)?;

        let local = store.path(self.record.name());
        let remote = match local.file_name() {
            Some(file_name) => file_name.to_string_lossy().into_owned(),
            None => format!("{}.sqlite3", self.record.name()),
        };

        match replicator.upload(&local, &remote) {
            Ok(()) => {
                self.record.advance(Stage::Replicate);
                info!(
                    sensor = %self.record.name(),
                    stage = %Stage::Replicate,
                    "Replicated {}",
                    remote
                );
                Ok(())
            }
            Err(e) => Err(self.fail(Stage::Replicate, e.into())),
        }
    }

    /// Fills documented keys the source left out and blanks values that
    /// cannot be real measurements.
    fn screen(&mut self, mut values: Values) -> Values {
        let kind = self.record.descriptor.kind;

        for key in kind.value_keys() {
            if !values.contains_key(*key) {
                self.warning(format!("{} missing from reading", key));
                values.insert(key.to_string(), ERROR_SENTINEL);
            }
        }

        let mut rejected = Vec::new();
        for (key, value) in values.iter_mut() {
            if !kind.is_plausible(key, *value) {
                if *value != ERROR_SENTINEL {
                    rejected.push(format!("{} out of range: {}", key, value));
                }
                *value = ERROR_SENTINEL;
            }
        }
        for message in rejected {
            self.warning(message);
        }

        values
    }

    fn warning(&mut self, message: String) {
        warn!(sensor = %self.record.name(), "{}", message);
        self.record.warnings.push(message);
    }

    fn require(&self, expected: Status, stage: Stage) -> Result<(), LifecycleError> {
        if self.record.status == expected {
            Ok(())
        } else {
            Err(self.out_of_order(stage))
        }
    }

    fn out_of_order(&self, stage: Stage) -> LifecycleError {
        LifecycleError::OutOfOrder {
            stage,
            status: self.record.status,
        }
    }

    fn fail(&mut self, stage: Stage, err: LifecycleError) -> LifecycleError {
        if stage == Stage::Replicate {
            warn!(sensor = %self.record.name(), stage = %stage, "{}", err);
        } else {
            error!(sensor = %self.record.name(), stage = %stage, "{}", err);
        }
        self.record.fail(stage, err.to_string());
        err
    }
}
