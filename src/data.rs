use std::{collections::HashSet, fmt, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{DashboardError, Result};

/// A single typed cell, either in a cleaned table or in a query result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Date(NaiveDate),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 {
                    format!("{f:.0}")
                } else {
                    f.to_string()
                }
            }
            Value::Decimal(d) => d.to_string(),
            Value::Text(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let output = match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Decimal(d) => {
                ToSqlOutput::Owned(d.to_f64().map_or(SqlValue::Null, SqlValue::Real))
            }
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            // ISO dates compare correctly as text, which BETWEEN and strftime rely on.
            Value::Date(d) => ToSqlOutput::Owned(SqlValue::Text(d.format("%Y-%m-%d").to_string())),
        };
        Ok(output)
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Float(f),
            ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Value::Text(format!("<{} bytes>", bytes.len())),
        }
    }
}

/// Rows of untyped text cells under named headers, as handed over by ingestion.
#[derive(Debug, Clone)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        let mut taken = headers
            .iter()
            .filter(|h| !h.trim().is_empty())
            .map(|h| h.to_lowercase())
            .collect::<HashSet<_>>();
        let headers = headers
            .into_iter()
            .enumerate()
            .map(|(idx, header)| {
                if header.trim().is_empty() {
                    let name = unique_name(&format!("unnamed_{idx}"), &taken);
                    taken.insert(name.to_lowercase());
                    name
                } else {
                    header
                }
            })
            .collect::<Vec<_>>();
        let mut seen = HashSet::with_capacity(headers.len());
        for header in &headers {
            if !seen.insert(header.as_str()) {
                return Err(DashboardError::Ingestion(format!(
                    "duplicate column name '{header}'"
                )));
            }
        }
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != headers.len() {
                return Err(DashboardError::Ingestion(format!(
                    "row {} has {} field(s), expected {}",
                    idx + 2,
                    row.len(),
                    headers.len()
                )));
            }
        }
        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(move |row| row[index].as_str())
    }

    /// SHA-256 over headers and cells, independent of delimiter or encoding.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for header in &self.headers {
            hasher.update(header.as_bytes());
            hasher.update([0x1f]);
        }
        for row in &self.rows {
            hasher.update([0x1e]);
            for cell in row {
                hasher.update(cell.as_bytes());
                hasher.update([0x1f]);
            }
        }
        format!("{:x}", hasher.finalize())
    }
}

/// `base`, or `base_2`, `base_3`, ... when `taken` (lowercased names) already
/// holds it. SQLite compares column names case-insensitively.
pub(crate) fn unique_name(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(&base.to_lowercase()) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !taken.contains(&candidate.to_lowercase()))
        .unwrap_or_else(|| base.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Text,
    Decimal,
    Number,
    Date,
}

impl ColumnKind {
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnKind::Text | ColumnKind::Date => "TEXT",
            ColumnKind::Decimal | ColumnKind::Number => "REAL",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub values: Vec<Value>,
}

impl Column {
    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }
}

/// Column-oriented typed table produced by normalization.
#[derive(Debug, Clone)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let row_count = columns.first().map_or(0, |c| c.values.len());
        if let Some(column) = columns.iter().find(|c| c.values.len() != row_count) {
            return Err(DashboardError::Ingestion(format!(
                "column '{}' has {} value(s), expected {row_count}",
                column.name,
                column.values.len()
            )));
        }
        Ok(Self { columns, row_count })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn row(&self, index: usize) -> impl Iterator<Item = &Value> + '_ {
        self.columns.iter().map(move |c| &c.values[index])
    }
}

pub fn parse_naive_date(value: &str) -> Option<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y"];
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
    ];
    let trimmed = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Parses currency-formatted text such as `$1,234.50`, `€ 12` or `(3.10)`.
pub fn parse_currency(value: &str) -> Option<Decimal> {
    let mut body = value.trim();
    let mut negative = false;
    if body.len() > 2 && body.starts_with('(') && body.ends_with(')') {
        negative = true;
        body = body[1..body.len() - 1].trim();
    }
    let mut sign_consumed = negative;
    let mut digits = String::with_capacity(body.len());
    for ch in body.chars() {
        match ch {
            '0'..='9' | '.' => digits.push(ch),
            '-' | '+' if digits.is_empty() && !sign_consumed => {
                sign_consumed = true;
                negative = ch == '-';
            }
            ',' | '_' | ' ' | '$' | '€' | '£' | '¥' => continue,
            _ => return None,
        }
    }
    if digits.is_empty() {
        return None;
    }
    let parsed = Decimal::from_str(&digits).ok()?;
    Some(if negative { -parsed } else { parsed })
}

pub fn parse_number(value: &str) -> Option<f64> {
    let cleaned = value
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '_'))
        .collect::<String>();
    cleaned.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Empty cells and the usual "no value" tokens (`NA`, `#N/A`, `null`, `---`).
pub fn is_missing(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return true;
    }
    let lowered = trimmed.to_ascii_lowercase();
    let stripped = lowered.trim_start_matches('#');
    matches!(
        stripped,
        "na" | "n/a" | "n.a." | "nan" | "null" | "none" | "missing"
    ) || (!stripped.is_empty() && stripped.chars().all(|c| c == '-'))
}
