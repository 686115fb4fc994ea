//! Row layouts per sensor kind.

use crate::error::StorageError;
use crate::sensors::{SensorKind, Values};
use crate::storage::Scalar;
use chrono::{NaiveDateTime, TimeDelta};

/// Leading column of every table.
pub const TIMESTAMP_COLUMN: &str = "DateTime";

/// Stored timestamp format. Fixed width, so text order is time order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Formats a timestamp the way it is stored.
pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a stored timestamp.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).ok()
}

/// Returns `now` minus `hours`, or `None` when that is out of range.
pub fn hours_before(now: &NaiveDateTime, hours: i64) -> Option<NaiveDateTime> {
    now.checked_sub_signed(TimeDelta::try_hours(hours)?)
}

/// Ordered value columns for one sensor kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaTable {
    pub kind: SensorKind,
    pub columns: Vec<String>,
}

impl SchemaTable {
    pub fn new(kind: SensorKind, columns: Vec<String>) -> Self {
        Self { kind, columns }
    }

    /// Full table layout: the timestamp column followed by the value columns.
    pub fn layout(&self) -> Vec<String> {
        std::iter::once(TIMESTAMP_COLUMN.to_string())
            .chain(self.columns.iter().cloned())
            .collect()
    }

    /// Builds a row: the timestamp, then the values in the kind's documented
    /// key order.
    ///
    /// Column names are labels and may differ from the value keys. Only the
    /// column count has to match, and every documented key must be present.
    pub fn row(
        &self,
        timestamp: &NaiveDateTime,
        values: &Values,
    ) -> Result<Vec<Scalar>, StorageError> {
        let mismatch = || StorageError::SchemaMismatch {
            expected: self.columns.clone(),
            actual: values.keys().cloned().collect(),
        };

        let keys = self.kind.value_keys();
        if values.len() != self.columns.len() || keys.len() != self.columns.len() {
            return Err(mismatch());
        }

        let mut row = Vec::with_capacity(self.columns.len() + 1);
        row.push(Scalar::Text(format_timestamp(timestamp)));
        for key in keys {
            let value = values.get(*key).ok_or_else(mismatch)?;
            row.push(Scalar::Real(*value));
        }
        Ok(row)
    }
}

/// The schema of every sensor kind for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSet {
    cpu: SchemaTable,
    bme280: SchemaTable,
    tsl2572: SchemaTable,
}

impl SchemaSet {
    pub fn new(cpu: Vec<String>, bme280: Vec<String>, tsl2572: Vec<String>) -> Self {
        Self {
            cpu: SchemaTable::new(SensorKind::CpuThermal, cpu),
            bme280: SchemaTable::new(SensorKind::PressureHumidityTemp, bme280),
            tsl2572: SchemaTable::new(SensorKind::Illuminance, tsl2572),
        }
    }

    /// Returns the schema for a kind.
    pub fn get(&self, kind: SensorKind) -> &SchemaTable {
        match kind {
            SensorKind::CpuThermal => &self.cpu,
            SensorKind::PressureHumidityTemp => &self.bme280,
            SensorKind::Illuminance => &self.tsl2572,
        }
    }
}

impl Default for SchemaSet {
    /// Columns named after the value keys of each kind.
    fn default() -> Self {
        let keys = |kind: SensorKind| -> Vec<String> {
            kind.value_keys().iter().map(|k| k.to_string()).collect()
        };
        Self::new(
            keys(SensorKind::CpuThermal),
            keys(SensorKind::PressureHumidityTemp),
            keys(SensorKind::Illuminance),
        )
    }
}
