//! Typed failures surfaced by the dashboard core.
//!
//! Detection, ingestion and query failures are distinct variants so callers
//! can tell "this file is not a dataset we know" apart from "the query could
//! not run" and from "the query ran and matched nothing" (which is not an
//! error at all).

use thiserror::Error;

pub type Result<T, E = DashboardError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Could not classify this file: columns [{}] match no known dataset", .columns.join(", "))]
    UnrecognizedSchema { columns: Vec<String> },
    #[error("Table has no {0}")]
    EmptyTable(&'static str),
    #[error("Malformed input: {0}")]
    Ingestion(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Query failed: {source} (sql: {sql})")]
    Query {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("Dataset store error: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("No dataset has been loaded yet")]
    NoDataset,
    #[error("Unknown query '{name}' for {variant} datasets")]
    UnknownQuery { name: String, variant: String },
    #[error("Query '{name}' needs column '{column}', which this dataset does not have")]
    QueryUnavailable { name: String, column: String },
    #[error("Invalid filter '{0}'")]
    InvalidFilter(String),
    #[error("Dataset store lock was poisoned by a panicking thread")]
    LockPoisoned,
}

impl DashboardError {
    pub(crate) fn query(sql: &str, source: rusqlite::Error) -> Self {
        DashboardError::Query {
            sql: sql.to_string(),
            source,
        }
    }
}
