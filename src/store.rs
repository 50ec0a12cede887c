//! Embedded SQLite store holding the single active dataset.
//!
//! All access goes through one connection guarded by a mutex, so a
//! [`DatasetStore`] can be shared between threads. [`DatasetStore::replace`]
//! drops, recreates, fills and registers the table inside one transaction;
//! readers either see the previous dataset in full or the new one in full.
//! File-backed stores run in WAL mode so other processes opening the same
//! file get the same guarantee.

use std::{
    fs,
    path::Path,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use itertools::Itertools;
use log::{debug, info};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde::Serialize;

use crate::{
    data::{Table, Value},
    error::{DashboardError, Result},
    schema::Variant,
};

/// Logical name the active dataset is always stored under.
pub const DATASET_TABLE: &str = "dataset";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const META_DDL: &str = "CREATE TABLE IF NOT EXISTS dataset_meta (
    table_name TEXT PRIMARY KEY,
    variant TEXT NOT NULL,
    row_count INTEGER NOT NULL,
    source TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    loaded_at TEXT NOT NULL
)";

/// Tabular output of one query. Zero rows is a valid result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(index))
    }

    pub fn column_values(&self, column: &str) -> Vec<&Value> {
        match self.column_index(column) {
            Some(index) => self.rows.iter().map(|r| &r[index]).collect(),
            None => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub sql_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetDescription {
    pub table: String,
    pub columns: Vec<ColumnInfo>,
    pub row_count: usize,
}

impl DatasetDescription {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }
}

/// Bookkeeping written alongside every successful replace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadMetadata {
    pub variant: Variant,
    pub row_count: usize,
    pub source: String,
    pub fingerprint: String,
    pub loaded_at: String,
}

pub struct DatasetStore {
    conn: Mutex<Connection>,
    location: String,
}

impl DatasetStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::configure(&conn)?;
        debug!("Opened dataset store at {path:?}");
        Ok(Self {
            conn: Mutex::new(conn),
            location: path.display().to_string(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: ":memory:".to_string(),
        })
    }

    fn configure(conn: &Connection) -> Result<()> {
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!("Dataset store journal mode: {mode}");
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(META_DDL)?;
        Ok(())
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DashboardError::LockPoisoned)
    }

    /// Swaps in `table` under `table_name` as a single transaction.
    pub fn replace(&self, table_name: &str, table: &Table, metadata: &LoadMetadata) -> Result<()> {
        let quoted = quote_identifier(table_name);
        let column_defs = table
            .columns()
            .iter()
            .map(|c| format!("{} {}", quote_identifier(&c.name), c.kind.sql_type()))
            .join(", ");
        let placeholders = vec!["?"; table.columns().len()].join(", ");

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {quoted}; CREATE TABLE {quoted} ({column_defs});"
        ))?;
        {
            let mut insert = tx.prepare(&format!("INSERT INTO {quoted} VALUES ({placeholders})"))?;
            for index in 0..table.row_count() {
                insert.execute(params_from_iter(table.row(index)))?;
            }
        }
        tx.execute(
            "INSERT OR REPLACE INTO dataset_meta
                (table_name, variant, row_count, source, fingerprint, loaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                table_name,
                metadata.variant.as_str(),
                metadata.row_count as i64,
                metadata.source,
                metadata.fingerprint,
                metadata.loaded_at,
            ],
        )?;
        tx.commit()?;
        info!(
            "Replaced table '{table_name}' in {} with {} row(s) across {} column(s)",
            self.location,
            table.row_count(),
            table.columns().len()
        );
        Ok(())
    }

    pub fn query(&self, sql: &str) -> Result<QueryResult> {
        self.query_with(sql, &[])
    }

    /// Runs a read query with positional parameters bound in order. Statements
    /// that would modify the database are rejected before they run.
    pub fn query_with(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let conn = self.lock()?;
        debug!("Executing query with {} bound value(s): {sql}", params.len());
        let mut stmt = conn.prepare(sql).map_err(|e| DashboardError::query(sql, e))?;
        if !stmt.readonly() {
            return Err(DashboardError::query(sql, rusqlite::Error::InvalidQuery));
        }
        let columns = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();
        let mut rows = stmt
            .query(params_from_iter(params.iter()))
            .map_err(|e| DashboardError::query(sql, e))?;
        let mut output = Vec::new();
        while let Some(row) = rows.next().map_err(|e| DashboardError::query(sql, e))? {
            let values = (0..columns.len())
                .map(|index| row.get_ref(index).map(Value::from))
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| DashboardError::query(sql, e))?;
            output.push(values);
        }
        Ok(QueryResult {
            columns,
            rows: output,
        })
    }

    pub fn describe(&self) -> Result<DatasetDescription> {
        self.describe_table(DATASET_TABLE)
    }

    pub fn describe_table(&self, table_name: &str) -> Result<DatasetDescription> {
        let conn = self.lock()?;
        let columns = {
            let mut stmt = conn.prepare("SELECT name, type FROM pragma_table_info(?1)")?;
            let columns = stmt
                .query_map([table_name], |row| {
                    Ok(ColumnInfo {
                        name: row.get(0)?,
                        sql_type: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            columns
        };
        if columns.is_empty() {
            return Err(DashboardError::NoDataset);
        }
        let count_sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table_name));
        let row_count: i64 = conn
            .query_row(&count_sql, [], |row| row.get(0))
            .map_err(|e| DashboardError::query(&count_sql, e))?;
        Ok(DatasetDescription {
            table: table_name.to_string(),
            columns,
            row_count: usize::try_from(row_count).unwrap_or_default(),
        })
    }

    /// Metadata recorded by the last replace of `table_name`, if any.
    pub fn metadata(&self, table_name: &str) -> Result<Option<LoadMetadata>> {
        let conn = self.lock()?;
        let metadata = conn
            .query_row(
                "SELECT variant, row_count, source, fingerprint, loaded_at
                 FROM dataset_meta WHERE table_name = ?1",
                [table_name],
                |row| {
                    let variant: String = row.get(0)?;
                    let row_count: i64 = row.get(1)?;
                    Ok(LoadMetadata {
                        variant: Variant::parse(&variant).unwrap_or(Variant::Unrecognized),
                        row_count: usize::try_from(row_count).unwrap_or_default(),
                        source: row.get(2)?,
                        fingerprint: row.get(3)?,
                        loaded_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(metadata)
    }
}

/// Quotes an SQL identifier, doubling any embedded double quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
