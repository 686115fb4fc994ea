//! Per-run state of one sensor.

use crate::sensors::{SensorDescriptor, Values};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

/// Lifecycle stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Identify,
    Sample,
    Persist,
    Replicate,
}

impl Stage {
    /// Status reached when this stage completes.
    fn completed_status(&self) -> Status {
        match self {
            Stage::Identify => Status::Identified,
            Stage::Sample => Status::Sampled,
            Stage::Persist => Status::Persisted,
            Stage::Replicate => Status::Replicated,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Identify => write!(f, "identify"),
            Stage::Sample => write!(f, "sample"),
            Stage::Persist => write!(f, "persist"),
            Stage::Replicate => write!(f, "replicate"),
        }
    }
}

/// Lifecycle state. `Failed` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Identified,
    Sampled,
    Persisted,
    Replicated,
    Failed(Stage),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Pending => write!(f, "pending"),
            Status::Identified => write!(f, "identified"),
            Status::Sampled => write!(f, "sampled"),
            Status::Persisted => write!(f, "persisted"),
            Status::Replicated => write!(f, "replicated"),
            Status::Failed(stage) => write!(f, "failed({})", stage),
        }
    }
}

/// Everything known about one sensor during a run.
#[derive(Debug, Clone, Serialize)]
pub struct SensorRecord {
    pub descriptor: SensorDescriptor,
    pub status: Status,
    /// Last stage that succeeded.
    pub completed: Option<Stage>,
    /// Time the sample was taken.
    pub timestamp: Option<NaiveDateTime>,
    pub values: Values,
    /// Diagnostic of the failing stage.
    pub failure: Option<String>,
    /// Soft problems that did not stop the lifecycle.
    pub warnings: Vec<String>,
}

impl SensorRecord {
    /// Creates a pending record.
    pub fn new(descriptor: SensorDescriptor) -> Self {
        Self {
            descriptor,
            status: Status::Pending,
            completed: None,
            timestamp: None,
            values: Values::new(),
            failure: None,
            warnings: Vec::new(),
        }
    }

    /// Returns the configured sensor name.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Returns the stage that failed, if any.
    pub fn failure_stage(&self) -> Option<Stage> {
        match self.status {
            Status::Failed(stage) => Some(stage),
            _ => None,
        }
    }

    /// Returns true once the reading is in the local datastore, regardless of
    /// what happened to replication.
    pub fn is_persisted(&self) -> bool {
        self.completed >= Some(Stage::Persist)
    }

    /// Returns true if no stage failed.
    pub fn is_ok(&self) -> bool {
        self.failure_stage().is_none()
    }

    pub(crate) fn advance(&mut self, stage: Stage) {
        self.completed = Some(stage);
        self.status = stage.completed_status();
    }

    pub(crate) fn fail(&mut self, stage: Stage, message: String) {
        self.status = Status::Failed(stage);
        self.failure = Some(message);
    }
}
