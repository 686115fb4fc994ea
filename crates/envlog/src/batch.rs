//! Runs every configured sensor of a profile once.

use crate::config::RunConfiguration;
use crate::controller::SensorController;
use crate::error::ResolutionError;
use crate::record::SensorRecord;
use crate::replication::{Replicator, ShareReplicator};
use crate::sensors::{Hardware, ERROR_SENTINEL};
use crate::storage::Datastore;
use chrono::{Local, NaiveDateTime};
use serde::{Serialize, Serializer};
use std::fmt;
use tracing::{info, warn};

/// What happened to one configured name.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum Outcome {
    /// The lifecycle ran, successfully or up to its first failure.
    Completed(SensorRecord),
    /// The name did not resolve; nothing ran.
    Unresolved {
        name: String,
        #[serde(serialize_with = "serialize_display")]
        error: ResolutionError,
    },
}

fn serialize_display<T: fmt::Display, S: Serializer>(
    value: &T,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

impl Outcome {
    pub fn name(&self) -> &str {
        match self {
            Outcome::Completed(record) => record.name(),
            Outcome::Unresolved { name, .. } => name,
        }
    }

    pub fn record(&self) -> Option<&SensorRecord> {
        match self {
            Outcome::Completed(record) => Some(record),
            Outcome::Unresolved { .. } => None,
        }
    }
}

/// Outcomes of one batch run, in configured order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub profile: String,
    pub started: NaiveDateTime,
    pub outcomes: Vec<Outcome>,
}

impl BatchReport {
    fn records(&self) -> impl Iterator<Item = &SensorRecord> {
        self.outcomes.iter().filter_map(Outcome::record)
    }

    /// Sensors that went through every stage they were asked to.
    pub fn succeeded(&self) -> usize {
        self.records().filter(|r| r.is_ok()).count()
    }

    /// Sensors that stopped at a failed stage.
    pub fn failed(&self) -> usize {
        self.records().filter(|r| !r.is_ok()).count()
    }

    /// Sensors whose reading reached the local datastore.
    pub fn persisted(&self) -> usize {
        self.records().filter(|r| r.is_persisted()).count()
    }

    /// Names that did not resolve.
    pub fn unresolved(&self) -> usize {
        self.outcomes.len() - self.records().count()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Profile {} started {}",
            self.profile,
            self.started.format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(f, "{:<14} {:<24} {:<18} VALUES", "SENSOR", "KIND", "STATUS")?;

        for outcome in &self.outcomes {
            match outcome {
                Outcome::Completed(record) => {
                    let values = record
                        .values
                        .iter()
                        .map(|(key, value)| {
                            if *value == ERROR_SENTINEL {
                                format!("{}=n/a", key)
                            } else {
                                format!("{}={:.2}", key, value)
                            }
                        })
                        .collect::<Vec<_>>()
                        .join(" ");
                    writeln!(
                        f,
                        "{:<14} {:<24} {:<18} {}",
                        record.name(),
                        record.descriptor.kind.to_string(),
                        record.status.to_string(),
                        values
                    )?;
                }
                Outcome::Unresolved { name, .. } => {
                    writeln!(f, "{:<14} {:<24} {:<18}", name, "-", "unresolved")?;
                }
            }
        }

        write!(
            f,
            "{} ok, {} failed, {} unresolved, {} persisted",
            self.succeeded(),
            self.failed(),
            self.unresolved(),
            self.persisted()
        )
    }
}

/// Runs the sensors of one profile, isolated from each other.
pub struct BatchRunner {
    config: RunConfiguration,
}

impl BatchRunner {
    pub fn new(config: RunConfiguration) -> Self {
        Self { config }
    }

    /// Runs the batch, replicating to the profile's share when one is set.
    pub fn run(&self, hardware: &mut dyn Hardware, store: &dyn Datastore) -> BatchReport {
        let replicator = self.config.replication.clone().map(ShareReplicator::new);
        self.run_with(
            hardware,
            store,
            replicator.as_ref().map(|r| r as &dyn Replicator),
        )
    }

    /// Runs the batch with an explicit replicator.
    pub fn run_with(
        &self,
        hardware: &mut dyn Hardware,
        store: &dyn Datastore,
        replicator: Option<&dyn Replicator>,
    ) -> BatchReport {
        let started = Local::now().naive_local();
        info!(
            "Running profile {} with {} sensors",
            self.config.profile,
            self.config.sensors.len()
        );

        let mut outcomes = Vec::with_capacity(self.config.sensors.len());
        for name in &self.config.sensors {
            let descriptor = match self.config.registry.resolve(name) {
                Ok(descriptor) => descriptor,
                Err(error) => {
                    warn!(sensor = %name, "{}, skipping", error);
                    outcomes.push(Outcome::Unresolved {
                        name: name.clone(),
                        error,
                    });
                    continue;
                }
            };

            let schema = self.config.schemas.get(descriptor.kind);
            let record = SensorController::new(descriptor, schema).run(hardware, store, replicator);
            outcomes.push(Outcome::Completed(record));
        }

        let report = BatchReport {
            profile: self.config.profile.clone(),
            started,
            outcomes,
        };
        info!(
            "Batch finished: {} ok, {} failed, {} unresolved",
            report.succeeded(),
            report.failed(),
            report.unresolved()
        );
        report
    }
}
