//! The dashboard's application state: one store, at most one active dataset.
//!
//! [`Dashboard`] is the object the presentation layer holds on to. It runs the
//! load pipeline (detect, normalize, replace), lists filter options for the
//! active variant, and executes catalog queries under a filter set.

use std::{collections::BTreeMap, path::Path};

use chrono::{NaiveDate, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    data::{RawTable, Value, parse_naive_date},
    error::{DashboardError, Result},
    filter::{FilterSet, Predicate, build_predicate},
    normalize::{NormalizationReport, normalize},
    queries::{self, QuerySpec},
    schema::{FilterKind, Variant, detect},
    store::{DATASET_TABLE, DatasetStore, LoadMetadata, QueryResult},
};

#[derive(Debug, Clone, Serialize)]
pub struct ActiveDataset {
    pub variant: Variant,
    pub columns: Vec<String>,
    pub row_count: usize,
    pub metadata: LoadMetadata,
}

impl ActiveDataset {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub variant: Variant,
    pub row_count: usize,
    pub fingerprint: String,
    pub report: NormalizationReport,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DateBounds {
    pub min: Option<NaiveDate>,
    pub max: Option<NaiveDate>,
}

/// Values for populating selection widgets of the active variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub categorical: BTreeMap<String, Vec<String>>,
    pub date_bounds: BTreeMap<String, DateBounds>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NamedResult {
    pub name: &'static str,
    pub title: &'static str,
    #[serde(flatten)]
    pub result: QueryResult,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Overrides the row limit of top-N queries.
    pub top: Option<usize>,
}

pub struct Dashboard {
    store: DatasetStore,
    active: Option<ActiveDataset>,
}

impl Dashboard {
    /// Wraps a store, picking up a dataset a previous session left in it.
    pub fn new(store: DatasetStore) -> Result<Self> {
        let active = match store.metadata(DATASET_TABLE)? {
            Some(metadata) => match store.describe() {
                Ok(description) => Some(ActiveDataset {
                    variant: metadata.variant,
                    columns: description.columns.into_iter().map(|c| c.name).collect(),
                    row_count: description.row_count,
                    metadata,
                }),
                Err(DashboardError::NoDataset) => None,
                Err(err) => return Err(err),
            },
            None => None,
        };
        if let Some(active) = &active {
            debug!(
                "Resuming {} dataset with {} row(s) loaded at {}",
                active.variant, active.row_count, active.metadata.loaded_at
            );
        }
        Ok(Self { store, active })
    }

    pub fn open(path: &Path) -> Result<Self> {
        Self::new(DatasetStore::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(DatasetStore::open_in_memory()?)
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    pub fn active(&self) -> Option<&ActiveDataset> {
        self.active.as_ref()
    }

    pub fn variant(&self) -> Variant {
        self.active
            .as_ref()
            .map_or(Variant::Unrecognized, |active| active.variant)
    }

    fn require_active(&self) -> Result<&ActiveDataset> {
        self.active.as_ref().ok_or(DashboardError::NoDataset)
    }

    /// Detects, normalizes and installs `raw` as the active dataset. On any
    /// failure the previously active dataset stays in place.
    pub fn load(&mut self, raw: &RawTable, source: &str) -> Result<LoadSummary> {
        if raw.headers().is_empty() {
            return Err(DashboardError::EmptyTable("columns"));
        }
        let variant = detect(raw.headers());
        if variant == Variant::Unrecognized {
            warn!(
                "Rejected '{source}': {} column(s) match no known dataset",
                raw.headers().len()
            );
            return Err(DashboardError::UnrecognizedSchema {
                columns: raw.headers().to_vec(),
            });
        }
        let (table, report) = normalize(variant, raw)?;
        let metadata = LoadMetadata {
            variant,
            row_count: table.row_count(),
            source: source.to_string(),
            fingerprint: raw.fingerprint(),
            loaded_at: Utc::now().to_rfc3339(),
        };
        self.store.replace(DATASET_TABLE, &table, &metadata)?;
        info!(
            "Loaded '{source}' as {variant} dataset: {} row(s), {} parse warning(s)",
            table.row_count(),
            report.warning_count()
        );
        let summary = LoadSummary {
            variant,
            row_count: table.row_count(),
            fingerprint: metadata.fingerprint.clone(),
            report,
        };
        self.active = Some(ActiveDataset {
            variant,
            columns: table.columns().iter().map(|c| c.name.clone()).collect(),
            row_count: table.row_count(),
            metadata,
        });
        Ok(summary)
    }

    pub fn filter_options(&self) -> Result<FilterOptions> {
        let active = self.require_active()?;
        let mut options = FilterOptions::default();
        for spec in active.variant.filters() {
            if !active.has_column(spec.column) {
                continue;
            }
            let column = spec.column;
            match spec.kind {
                FilterKind::Categorical => {
                    let result = self.store.query(&format!(
                        "SELECT DISTINCT {column} FROM {DATASET_TABLE} \
                         WHERE {column} IS NOT NULL ORDER BY {column}"
                    ))?;
                    let values = result
                        .rows
                        .iter()
                        .filter_map(|row| row.first())
                        .map(Value::as_display)
                        .collect();
                    options.categorical.insert(spec.key.to_string(), values);
                }
                FilterKind::DateRange => {
                    let result = self.store.query(&format!(
                        "SELECT MIN({column}), MAX({column}) FROM {DATASET_TABLE} \
                         WHERE {column} IS NOT NULL"
                    ))?;
                    let bound = |index: usize| {
                        result
                            .rows
                            .first()
                            .and_then(|row| row.get(index))
                            .and_then(Value::as_str)
                            .and_then(parse_naive_date)
                    };
                    options.date_bounds.insert(
                        spec.key.to_string(),
                        DateBounds {
                            min: bound(0),
                            max: bound(1),
                        },
                    );
                }
            }
        }
        Ok(options)
    }

    /// Catalog queries whose columns are all present in the active dataset.
    pub fn available_queries(&self) -> Vec<&'static QuerySpec> {
        let Some(active) = &self.active else {
            return Vec::new();
        };
        queries::catalog(active.variant)
            .iter()
            .filter(|spec| {
                spec.required_columns()
                    .iter()
                    .all(|column| active.has_column(column))
            })
            .collect()
    }

    /// Builds the predicate for `filters`, dropping keys whose column the
    /// active dataset does not carry.
    pub fn predicate(&self, filters: &FilterSet) -> Result<Predicate> {
        let active = self.require_active()?;
        let mut applicable = filters.clone();
        for key in filters.keys() {
            if let Some(spec) = active.variant.filter_spec(key)
                && !active.has_column(spec.column)
            {
                debug!("Ignoring filter '{key}': column '{}' is not loaded", spec.column);
                applicable.remove(key);
            }
        }
        Ok(build_predicate(active.variant, &applicable))
    }

    pub fn run_query(
        &self,
        name: &str,
        filters: &FilterSet,
        options: &RunOptions,
    ) -> Result<NamedResult> {
        let active = self.require_active()?;
        let spec = queries::find(active.variant, name).ok_or_else(|| {
            DashboardError::UnknownQuery {
                name: name.to_string(),
                variant: active.variant.to_string(),
            }
        })?;
        if let Some(missing) = spec
            .required_columns()
            .into_iter()
            .find(|column| !active.has_column(column))
        {
            return Err(DashboardError::QueryUnavailable {
                name: spec.name.to_string(),
                column: missing.to_string(),
            });
        }
        let predicate = self.predicate(filters)?;
        self.execute(spec, &predicate, options)
    }

    /// Runs every available query under the same predicate.
    pub fn run_all(&self, filters: &FilterSet, options: &RunOptions) -> Result<Vec<NamedResult>> {
        let predicate = self.predicate(filters)?;
        self.available_queries()
            .into_iter()
            .map(|spec| self.execute(spec, &predicate, options))
            .collect()
    }

    fn execute(
        &self,
        spec: &'static QuerySpec,
        predicate: &Predicate,
        options: &RunOptions,
    ) -> Result<NamedResult> {
        let limit = if spec.is_top_n() { options.top } else { None };
        let result = spec.run(&self.store, predicate, limit)?;
        debug!("Query '{}' returned {} row(s)", spec.name, result.row_count());
        Ok(NamedResult {
            name: spec.name,
            title: spec.title,
            result,
        })
    }
}
