//! Per-variant column coercion from raw text into typed cells.
//!
//! Cells that cannot be parsed become nulls and are reported as
//! [`ParseWarning`]s; normalization never drops rows and never fails because
//! of an individual cell.

use std::collections::HashSet;

use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    data::{
        Column, ColumnKind, RawTable, Table, Value, is_missing, parse_currency, parse_naive_date,
        parse_number, unique_name,
    },
    error::{DashboardError, Result},
    schema::{SemanticType, Variant},
};

const MAX_WARNING_SAMPLES: usize = 5;

/// A cell that held text but could not be coerced to its column's type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    pub column: String,
    /// 1-based data row, not counting the header.
    pub row: usize,
    pub raw: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnTransform {
    pub column: String,
    pub semantic: SemanticType,
    pub nulls_before: usize,
    pub nulls_after: usize,
    pub warning_samples: Vec<ParseWarning>,
}

impl ColumnTransform {
    pub fn null_delta(&self) -> usize {
        self.nulls_after.saturating_sub(self.nulls_before)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NormalizationReport {
    pub variant: Variant,
    pub row_count: usize,
    pub transforms: Vec<ColumnTransform>,
    /// Optional schema columns the input did not carry.
    pub skipped: Vec<&'static str>,
    /// Extra columns renamed because their name clashed, ignoring case, with
    /// another column.
    pub renamed: Vec<ColumnRename>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRename {
    pub from: String,
    pub to: String,
}

impl NormalizationReport {
    pub fn transform(&self, column: &str) -> Option<&ColumnTransform> {
        self.transforms.iter().find(|t| t.column == column)
    }

    pub fn warning_count(&self) -> usize {
        self.transforms.iter().map(ColumnTransform::null_delta).sum()
    }
}

pub fn normalize(variant: Variant, raw: &RawTable) -> Result<(Table, NormalizationReport)> {
    if raw.headers().is_empty() {
        return Err(DashboardError::EmptyTable("columns"));
    }
    if raw.row_count() == 0 {
        return Err(DashboardError::EmptyTable("rows"));
    }
    if variant == Variant::Unrecognized {
        return Err(DashboardError::UnrecognizedSchema {
            columns: raw.headers().to_vec(),
        });
    }

    let (names, renamed) = stored_column_names(variant, raw.headers());
    for rename in &renamed {
        warn!(
            "Column '{}' clashes with another column name and is stored as '{}'",
            rename.from, rename.to
        );
    }

    let mut columns = Vec::with_capacity(raw.headers().len());
    let mut transforms = Vec::new();
    for (index, (header, name)) in raw.headers().iter().zip(&names).enumerate() {
        let semantic = variant
            .column_spec(header)
            .map_or(SemanticType::Text, |spec| spec.semantic);
        let (column, transform) = coerce_column(raw, index, name, semantic);
        if let Some(transform) = transform {
            if transform.null_delta() > 0 {
                let sample = transform
                    .warning_samples
                    .first()
                    .map(|w| w.raw.as_str())
                    .unwrap_or_default();
                warn!(
                    "Column '{}': {} value(s) could not be parsed as {:?} and were set to null (e.g. '{}')",
                    name,
                    transform.null_delta(),
                    semantic,
                    sample
                );
            }
            transforms.push(transform);
        }
        columns.push(column);
    }

    let skipped = variant
        .columns()
        .iter()
        .filter(|spec| raw.column_index(spec.name).is_none())
        .map(|spec| spec.name)
        .collect::<Vec<_>>();
    if !skipped.is_empty() {
        debug!("Optional {variant} column(s) not present: {skipped:?}");
    }

    let table = Table::new(columns)?;
    info!(
        "Normalized {} row(s) as a {variant} dataset ({} typed column(s))",
        table.row_count(),
        transforms.len()
    );
    let report = NormalizationReport {
        variant,
        row_count: table.row_count(),
        transforms,
        skipped,
        renamed,
    };
    Ok((table, report))
}

/// Names the columns get in the store. Schema columns keep their exact name;
/// any other header that matches an earlier or a schema name ignoring case
/// gets a numeric suffix.
fn stored_column_names(variant: Variant, headers: &[String]) -> (Vec<String>, Vec<ColumnRename>) {
    let is_schema = |header: &str| variant.column_spec(header).is_some();
    let mut taken = headers
        .iter()
        .filter(|h| is_schema(h.as_str()))
        .map(|h| h.to_lowercase())
        .collect::<HashSet<_>>();
    let originals = headers.iter().map(|h| h.to_lowercase()).collect::<HashSet<_>>();
    let mut renamed = Vec::new();
    let names = headers
        .iter()
        .map(|header| {
            if is_schema(header.as_str()) {
                return header.clone();
            }
            let lowered = header.to_lowercase();
            if taken.insert(lowered) {
                return header.clone();
            }
            let reserved = taken.union(&originals).cloned().collect::<HashSet<_>>();
            let name = unique_name(header, &reserved);
            taken.insert(name.to_lowercase());
            renamed.push(ColumnRename {
                from: header.clone(),
                to: name.clone(),
            });
            name
        })
        .collect();
    (names, renamed)
}

fn coerce_column(
    raw: &RawTable,
    index: usize,
    header: &str,
    semantic: SemanticType,
) -> (Column, Option<ColumnTransform>) {
    let (kind, parse): (ColumnKind, fn(&str) -> Option<Value>) = match semantic {
        SemanticType::Text => {
            let values = raw
                .column_values(index)
                .map(|cell| {
                    if is_missing(cell) {
                        Value::Null
                    } else {
                        Value::Text(cell.to_string())
                    }
                })
                .collect();
            let column = Column {
                name: header.to_string(),
                kind: ColumnKind::Text,
                values,
            };
            return (column, None);
        }
        SemanticType::Currency => (ColumnKind::Decimal, currency_cell as fn(&str) -> Option<Value>),
        SemanticType::Numeric => (ColumnKind::Number, number_cell as fn(&str) -> Option<Value>),
        SemanticType::Date => (ColumnKind::Date, date_cell as fn(&str) -> Option<Value>),
    };

    let mut nulls_before = 0usize;
    let mut warning_samples = Vec::new();
    let values = raw
        .column_values(index)
        .enumerate()
        .map(|(row, cell)| {
            if is_missing(cell) {
                nulls_before += 1;
                return Value::Null;
            }
            parse(cell).unwrap_or_else(|| {
                if warning_samples.len() < MAX_WARNING_SAMPLES {
                    warning_samples.push(ParseWarning {
                        column: header.to_string(),
                        row: row + 1,
                        raw: cell.to_string(),
                    });
                }
                Value::Null
            })
        })
        .collect::<Vec<_>>();
    let column = Column {
        name: header.to_string(),
        kind,
        values,
    };
    let transform = ColumnTransform {
        column: header.to_string(),
        semantic,
        nulls_before,
        nulls_after: column.null_count(),
        warning_samples,
    };
    (column, Some(transform))
}

fn currency_cell(cell: &str) -> Option<Value> {
    parse_currency(cell).map(Value::Decimal)
}

fn number_cell(cell: &str) -> Option<Value> {
    parse_number(cell).map(Value::Float)
}

fn date_cell(cell: &str) -> Option<Value> {
    parse_naive_date(cell).map(Value::Date)
}
