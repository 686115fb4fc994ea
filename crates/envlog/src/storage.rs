//! Per-sensor SQLite datastores.
//!
//! Each sensor owns one database file named after it. The table is declared
//! with "create if not exists" on every run and each reading is a single
//! INSERT, so an interrupted run never leaves a partial row behind.

use crate::error::StorageError;
use rusqlite::types::{ToSql, ToSqlOutput};
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A positional row value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Real(f64),
}

impl ToSql for Scalar {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Scalar::Text(text) => Ok(ToSqlOutput::from(text.as_str())),
            Scalar::Real(value) => Ok(ToSqlOutput::from(*value)),
        }
    }
}

/// Row appender with schema-on-first-use.
pub trait Datastore {
    /// Creates the table for `store` if it does not exist yet. The first
    /// column holds the timestamp, the rest hold readings.
    fn ensure_table(&self, store: &str, columns: &[String]) -> Result<(), StorageError>;

    /// Appends one row; values are positional and follow the column order.
    fn append_row(&self, store: &str, row: &[Scalar]) -> Result<(), StorageError>;

    /// Local file backing `store`.
    fn path(&self, store: &str) -> PathBuf;
}

/// A row read back from a datastore.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub datetime: String,
    pub columns: Vec<String>,
    pub values: Vec<Option<f64>>,
}

/// SQLite datastores in one directory.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    dir: PathBuf,
    table: String,
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

impl SqliteStore {
    /// Creates a store writing `<dir>/<name>.sqlite3` files with `table`.
    pub fn new<P: AsRef<Path>>(dir: P, table: &str) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            table: table.to_string(),
        }
    }

    fn open(&self, store: &str) -> Result<Connection, StorageError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.clone(),
            source,
        })?;
        Connection::open(self.path(store)).map_err(|e| sqlite(store, e))
    }

    fn existing_columns(&self, conn: &Connection, store: &str) -> Result<Vec<String>, StorageError> {
        let sql = format!("PRAGMA table_info({})", quote(&self.table));
        let mut stmt = conn.prepare(&sql).map_err(|e| sqlite(store, e))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .map_err(|e| sqlite(store, e))?;

        let mut columns = Vec::new();
        for name in names {
            columns.push(name.map_err(|e| sqlite(store, e))?);
        }
        Ok(columns)
    }

    /// Returns the most recently appended row.
    pub fn last_row(&self, store: &str) -> Result<Option<StoredRow>, StorageError> {
        if !self.path(store).exists() {
            return Ok(None);
        }
        let conn = self.open(store)?;
        let sql = format!(
            "SELECT * FROM {} ORDER BY rowid DESC LIMIT 1",
            quote(&self.table)
        );
        let mut stmt = conn.prepare(&sql).map_err(|e| sqlite(store, e))?;
        let columns = column_names(&stmt);
        stmt.query_row([], |row| read_row(row, &columns))
            .optional()
            .map_err(|e| sqlite(store, e))
    }

    /// Returns the rows stored after `since` (a stored timestamp string),
    /// oldest first.
    pub fn recent_rows(&self, store: &str, since: &str) -> Result<Vec<StoredRow>, StorageError> {
        if !self.path(store).exists() {
            return Ok(Vec::new());
        }
        let conn = self.open(store)?;
        let sql = format!(
            "SELECT * FROM {} WHERE {} > ?1 ORDER BY rowid",
            quote(&self.table),
            quote(crate::schema::TIMESTAMP_COLUMN)
        );
        let mut stmt = conn.prepare(&sql).map_err(|e| sqlite(store, e))?;
        let columns = column_names(&stmt);
        let rows = stmt
            .query_map([since], |row| read_row(row, &columns))
            .map_err(|e| sqlite(store, e))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(|e| sqlite(store, e))?);
        }
        Ok(result)
    }

    /// Number of rows in a datastore.
    pub fn row_count(&self, store: &str) -> Result<u64, StorageError> {
        if !self.path(store).exists() {
            return Ok(0);
        }
        let conn = self.open(store)?;
        let sql = format!("SELECT COUNT(*) FROM {}", quote(&self.table));
        let count: i64 = conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|e| sqlite(store, e))?;
        Ok(count as u64)
    }
}

fn sqlite(store: &str, source: rusqlite::Error) -> StorageError {
    StorageError::Sqlite {
        store: store.to_string(),
        source,
    }
}

fn column_names(stmt: &rusqlite::Statement<'_>) -> Vec<String> {
    stmt.column_names().into_iter().map(String::from).collect()
}

fn read_row(row: &rusqlite::Row<'_>, columns: &[String]) -> rusqlite::Result<StoredRow> {
    let mut values = Vec::with_capacity(columns.len().saturating_sub(1));
    for i in 1..columns.len() {
        values.push(row.get::<_, Option<f64>>(i)?);
    }
    Ok(StoredRow {
        datetime: row.get(0)?,
        columns: columns.iter().skip(1).cloned().collect(),
        values,
    })
}

impl Datastore for SqliteStore {
    fn ensure_table(&self, store: &str, columns: &[String]) -> Result<(), StorageError> {
        let definitions: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let kind = if i == 0 { "TEXT" } else { "REAL" };
                format!("{} {}", quote(column), kind)
            })
            .collect();
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote(&self.table),
            definitions.join(", ")
        );

        let conn = self.open(store)?;
        conn.execute_batch(&sql).map_err(|e| sqlite(store, e))?;

        // an existing table keeps its layout; refuse to write under other labels
        let existing = self.existing_columns(&conn, store)?;
        if existing != columns {
            return Err(StorageError::SchemaMismatch {
                expected: columns.to_vec(),
                actual: existing,
            });
        }
        debug!("Ensured table {} in {}", self.table, store);
        Ok(())
    }

    fn append_row(&self, store: &str, row: &[Scalar]) -> Result<(), StorageError> {
        let placeholders: Vec<String> = (1..=row.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} VALUES ({})",
            quote(&self.table),
            placeholders.join(", ")
        );

        let conn = self.open(store)?;
        conn.execute(&sql, rusqlite::params_from_iter(row.iter()))
            .map_err(|e| sqlite(store, e))?;
        Ok(())
    }

    fn path(&self, store: &str) -> PathBuf {
        self.dir.join(format!("{}.sqlite3", store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn row(datetime: &str, values: &[f64]) -> Vec<Scalar> {
        std::iter::once(Scalar::Text(datetime.to_string()))
            .chain(values.iter().map(|v| Scalar::Real(*v)))
            .collect()
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path(), "condition");
        let layout = columns(&["DateTime", "Temp", "Humi", "Pres"]);

        store.ensure_table("extbme280", &layout).unwrap();
        store
            .append_row("extbme280", &row("2024-03-09T07:05:03.000000", &[21.5, 40.2, 1011.3]))
            .unwrap();

        assert!(dir.path().join("extbme280.sqlite3").exists());
        let last = store.last_row("extbme280").unwrap().unwrap();
        assert_eq!(last.datetime, "2024-03-09T07:05:03.000000");
        assert_eq!(last.columns, columns(&["Temp", "Humi", "Pres"]));
        assert_eq!(last.values, vec![Some(21.5), Some(40.2), Some(1011.3)]);
    }

    #[test]
    fn test_ensure_table_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path(), "condition");
        let layout = columns(&["DateTime", "Illu"]);

        store.ensure_table("mnttsl2572", &layout).unwrap();
        store
            .append_row("mnttsl2572", &row("2024-03-09T07:05:03.000000", &[312.0]))
            .unwrap();
        store.ensure_table("mnttsl2572", &layout).unwrap();

        assert_eq!(store.row_count("mnttsl2572").unwrap(), 1);
        let last = store.last_row("mnttsl2572").unwrap().unwrap();
        assert_eq!(last.values, vec![Some(312.0)]);
    }

    #[test]
    fn test_ensure_table_rejects_other_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path(), "condition");
        store
            .ensure_table("mntbme280", &columns(&["DateTime", "Temp", "Humi", "Pres"]))
            .unwrap();

        let err = store
            .ensure_table(
                "mntbme280",
                &columns(&["DateTime", "Temperature", "Humidity", "Pressure"]),
            )
            .unwrap_err();
        match err {
            StorageError::SchemaMismatch { expected, actual } => {
                assert_eq!(expected[1], "Temperature");
                assert_eq!(actual, columns(&["DateTime", "Temp", "Humi", "Pres"]));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_append_wrong_width_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path(), "condition");
        store
            .ensure_table("cpu", &columns(&["DateTime", "Temp"]))
            .unwrap();

        let err = store
            .append_row("cpu", &row("2024-03-09T07:05:03.000000", &[48.0, 1.0]))
            .unwrap_err();
        assert!(matches!(err, StorageError::Sqlite { .. }));
        assert_eq!(store.row_count("cpu").unwrap(), 0);
    }

    #[test]
    fn test_recent_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path(), "condition");
        store
            .ensure_table("cpu", &columns(&["DateTime", "Temp"]))
            .unwrap();
        for (datetime, temp) in [
            ("2024-03-08T06:00:00.000000", 44.0),
            ("2024-03-09T06:00:00.000000", 45.0),
            ("2024-03-09T07:00:00.000000", 46.0),
        ] {
            store.append_row("cpu", &row(datetime, &[temp])).unwrap();
        }

        let rows = store.recent_rows("cpu", "2024-03-08T12:00:00.000000").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].values, vec![Some(45.0)]);
        assert_eq!(rows[1].datetime, "2024-03-09T07:00:00.000000");
    }

    #[test]
    fn test_missing_store_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("absent"), "condition");
        assert_eq!(store.last_row("cpu").unwrap(), None);
        assert!(store.recent_rows("cpu", "").unwrap().is_empty());
        assert_eq!(store.row_count("cpu").unwrap(), 0);
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("Temp"), "\"Temp\"");
        assert_eq!(quote("a\"b"), "\"a\"\"b\"");
    }
}
