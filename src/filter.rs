//! User filter selections and their translation into parameterized predicates.
//!
//! A [`FilterSet`] maps filter keys to either a set of allowed categorical
//! values or an inclusive date range. [`build_predicate`] turns it into a
//! [`Predicate`]: SQL text that only ever contains schema-defined column names
//! and `?` placeholders, plus the values to bind to those placeholders in
//! order. User-supplied values never appear in the SQL text.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use itertools::Itertools;
use log::{debug, warn};

use crate::{
    data::{Value, parse_naive_date},
    error::{DashboardError, Result},
    schema::{FilterKind, Variant},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    /// Allowed values; an empty set means "no restriction".
    Values(BTreeSet<String>),
    /// Inclusive bounds; a missing end is open.
    DateRange {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    entries: BTreeMap<String, FilterValue>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<I, S>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(
            key,
            FilterValue::Values(values.into_iter().map(Into::into).collect()),
        );
        self
    }

    pub fn with_date_range(
        mut self,
        key: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Self {
        self.set(key, FilterValue::DateRange { start, end });
        self
    }

    pub fn set(&mut self, key: &str, value: FilterValue) {
        self.entries.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<FilterValue> {
        self.entries.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Builds a filter set from `key=value` selections (repeatable per key)
    /// and `key=FROM..TO` date ranges where either end may be blank.
    pub fn parse(selections: &[String], ranges: &[String]) -> Result<Self> {
        let mut filters = FilterSet::new();
        for selection in selections {
            let (key, value) = split_assignment(selection)?;
            let entry = filters
                .entries
                .entry(key.to_string())
                .or_insert_with(|| FilterValue::Values(BTreeSet::new()));
            match entry {
                FilterValue::Values(values) => {
                    let value = unquote(value);
                    if !value.is_empty() {
                        values.insert(value.to_string());
                    }
                }
                FilterValue::DateRange { .. } => {
                    return Err(DashboardError::InvalidFilter(format!(
                        "'{key}' is already used as a date range"
                    )));
                }
            }
        }
        for range in ranges {
            let (key, bounds) = split_assignment(range)?;
            let Some((from, to)) = bounds.split_once("..") else {
                return Err(DashboardError::InvalidFilter(format!(
                    "{range} (expected KEY=FROM..TO)"
                )));
            };
            let value = FilterValue::DateRange {
                start: parse_bound(range, from)?,
                end: parse_bound(range, to)?,
            };
            if filters.entries.insert(key.to_string(), value).is_some() {
                return Err(DashboardError::InvalidFilter(format!(
                    "'{key}' is given more than once"
                )));
            }
        }
        Ok(filters)
    }
}

fn split_assignment(raw: &str) -> Result<(&str, &str)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value)),
        _ => Err(DashboardError::InvalidFilter(format!(
            "{raw} (expected KEY=VALUE)"
        ))),
    }
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 {
        let bytes = value.as_bytes();
        if (bytes[0] == b'"' && bytes[value.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[value.len() - 1] == b'\'')
        {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn parse_bound(raw: &str, bound: &str) -> Result<Option<NaiveDate>> {
    let bound = bound.trim();
    if bound.is_empty() {
        return Ok(None);
    }
    parse_naive_date(bound)
        .map(Some)
        .ok_or_else(|| DashboardError::InvalidFilter(format!("{raw} ('{bound}' is not a date)")))
}

/// A conjunction of clauses with the values bound to their placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl Predicate {
    pub fn universal() -> Self {
        Self::default()
    }

    pub fn is_universal(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[String] {
        &self.clauses
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// SQL boolean expression suitable for a `WHERE` clause.
    pub fn sql(&self) -> String {
        if self.clauses.is_empty() {
            "1 = 1".to_string()
        } else {
            self.clauses.iter().map(|c| format!("({c})")).join(" AND ")
        }
    }

    fn push(&mut self, clause: String, params: impl IntoIterator<Item = Value>) {
        self.clauses.push(clause);
        self.params.extend(params);
    }
}

pub fn build_predicate(variant: Variant, filters: &FilterSet) -> Predicate {
    let mut predicate = Predicate::universal();
    for (key, value) in filters.iter() {
        let Some(spec) = variant.filter_spec(key) else {
            debug!("Ignoring filter '{key}': not a {variant} filter key");
            continue;
        };
        match (spec.kind, value) {
            (FilterKind::Categorical, FilterValue::Values(values)) => {
                if values.is_empty() {
                    continue;
                }
                let placeholders = vec!["?"; values.len()].join(", ");
                predicate.push(
                    format!("{} IN ({placeholders})", spec.column),
                    values.iter().map(|v| Value::Text(v.clone())),
                );
            }
            (FilterKind::DateRange, FilterValue::DateRange { start, end }) => match (start, end) {
                (Some(start), Some(end)) => predicate.push(
                    format!("{} BETWEEN ? AND ?", spec.column),
                    [Value::Date(*start), Value::Date(*end)],
                ),
                (Some(start), None) => {
                    predicate.push(format!("{} >= ?", spec.column), [Value::Date(*start)])
                }
                (None, Some(end)) => {
                    predicate.push(format!("{} <= ?", spec.column), [Value::Date(*end)])
                }
                (None, None) => {}
            },
            (kind, _) => {
                warn!("Ignoring filter '{key}': value does not fit a {kind:?} filter");
            }
        }
    }
    predicate
}
