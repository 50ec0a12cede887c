//! Known dataset variants, their column schemas, and schema detection.
//!
//! Each [`Variant`] owns everything that differs between the two supported
//! dataset shapes: the indicator columns that identify it, the semantic type
//! of each source column (which drives normalization), the filter keys it
//! exposes, and (through [`crate::queries`]) its aggregate query catalog.
//!
//! Detection is a pure subset test on exact column names. Variants are checked
//! in [`DETECTION_ORDER`]; the first variant whose indicators are all present
//! wins. Indicator sets are disjoint, so the order only matters for files that
//! carry both sets, which classify as the first variant in the list.

use std::{collections::HashSet, fmt};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Rental,
    Retail,
    Unrecognized,
}

pub const DETECTION_ORDER: [Variant; 2] = [Variant::Rental, Variant::Retail];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Text,
    Currency,
    Numeric,
    Date,
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub semantic: SemanticType,
    pub indicator: bool,
}

const fn column(name: &'static str, semantic: SemanticType) -> ColumnSpec {
    ColumnSpec {
        name,
        semantic,
        indicator: false,
    }
}

const fn indicator(name: &'static str, semantic: SemanticType) -> ColumnSpec {
    ColumnSpec {
        name,
        semantic,
        indicator: true,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Categorical,
    DateRange,
}

/// A filter key a variant accepts and the schema column it restricts.
#[derive(Debug, Clone, Copy)]
pub struct FilterSpec {
    pub key: &'static str,
    pub column: &'static str,
    pub kind: FilterKind,
}

const RENTAL_COLUMNS: &[ColumnSpec] = &[
    column("id", SemanticType::Text),
    column("name", SemanticType::Text),
    column("host_id", SemanticType::Text),
    column("host_name", SemanticType::Text),
    column("neighbourhood_group", SemanticType::Text),
    column("neighbourhood", SemanticType::Text),
    column("latitude", SemanticType::Numeric),
    column("longitude", SemanticType::Numeric),
    indicator("room_type", SemanticType::Text),
    indicator("price", SemanticType::Currency),
    indicator("minimum_nights", SemanticType::Numeric),
    column("number_of_reviews", SemanticType::Numeric),
    column("last_review", SemanticType::Date),
    column("reviews_per_month", SemanticType::Numeric),
    indicator("availability_365", SemanticType::Numeric),
];

const RETAIL_COLUMNS: &[ColumnSpec] = &[
    indicator("transaction_id", SemanticType::Text),
    column("date", SemanticType::Date),
    column("customer_id", SemanticType::Text),
    column("gender", SemanticType::Text),
    column("age", SemanticType::Numeric),
    indicator("product_category", SemanticType::Text),
    column("quantity", SemanticType::Numeric),
    column("price_per_unit", SemanticType::Currency),
    indicator("total_amount", SemanticType::Currency),
    column("region", SemanticType::Text),
];

const RENTAL_FILTERS: &[FilterSpec] = &[
    FilterSpec {
        key: "room_type",
        column: "room_type",
        kind: FilterKind::Categorical,
    },
    FilterSpec {
        key: "neighbourhood_group",
        column: "neighbourhood_group",
        kind: FilterKind::Categorical,
    },
    FilterSpec {
        key: "neighbourhood",
        column: "neighbourhood",
        kind: FilterKind::Categorical,
    },
    FilterSpec {
        key: "last_review",
        column: "last_review",
        kind: FilterKind::DateRange,
    },
];

const RETAIL_FILTERS: &[FilterSpec] = &[
    FilterSpec {
        key: "product_category",
        column: "product_category",
        kind: FilterKind::Categorical,
    },
    FilterSpec {
        key: "gender",
        column: "gender",
        kind: FilterKind::Categorical,
    },
    FilterSpec {
        key: "region",
        column: "region",
        kind: FilterKind::Categorical,
    },
    FilterSpec {
        key: "date",
        column: "date",
        kind: FilterKind::DateRange,
    },
];

impl Variant {
    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Rental => "rental",
            Variant::Retail => "retail",
            Variant::Unrecognized => "unrecognized",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "rental" => Some(Variant::Rental),
            "retail" => Some(Variant::Retail),
            "unrecognized" => Some(Variant::Unrecognized),
            _ => None,
        }
    }

    pub fn columns(self) -> &'static [ColumnSpec] {
        match self {
            Variant::Rental => RENTAL_COLUMNS,
            Variant::Retail => RETAIL_COLUMNS,
            Variant::Unrecognized => &[],
        }
    }

    pub fn indicators(self) -> impl Iterator<Item = &'static str> {
        self.columns()
            .iter()
            .filter(|spec| spec.indicator)
            .map(|spec| spec.name)
    }

    pub fn column_spec(self, name: &str) -> Option<&'static ColumnSpec> {
        self.columns().iter().find(|spec| spec.name == name)
    }

    pub fn filters(self) -> &'static [FilterSpec] {
        match self {
            Variant::Rental => RENTAL_FILTERS,
            Variant::Retail => RETAIL_FILTERS,
            Variant::Unrecognized => &[],
        }
    }

    pub fn filter_spec(self, key: &str) -> Option<&'static FilterSpec> {
        self.filters().iter().find(|spec| spec.key == key)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a set of column names. Names must match exactly; no trimming
/// or case folding is applied.
pub fn detect<I, S>(column_names: I) -> Variant
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let names = column_names
        .into_iter()
        .map(|name| name.as_ref().to_string())
        .collect::<HashSet<_>>();
    DETECTION_ORDER
        .into_iter()
        .find(|variant| variant.indicators().all(|required| names.contains(required)))
        .unwrap_or(Variant::Unrecognized)
}
