//! Fixed per-variant catalog of aggregate queries.
//!
//! Every query is described declaratively by a [`QuerySpec`] and rendered to
//! SQL against [`DATASET_TABLE`] with the caller's [`Predicate`] spliced into
//! the `WHERE` clause. Only schema-defined column names and numeric bucket
//! boundaries are written into the SQL text; filter values are always bound.
//!
//! Null handling: each query lists the columns it requires to be non-null
//! (`not_null`), and grouped, bucketed and monthly queries additionally drop
//! rows whose grouping column is null. Counts and averages are therefore taken
//! over the non-null rows only.

use itertools::Itertools;

use crate::{
    error::Result,
    filter::Predicate,
    schema::Variant,
    store::{DATASET_TABLE, DatasetStore, QueryResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy)]
pub struct Measure {
    pub aggregate: Aggregate,
    /// `None` only for [`Aggregate::Count`], meaning `COUNT(*)`.
    pub column: Option<&'static str>,
    pub alias: &'static str,
}

const fn count(alias: &'static str) -> Measure {
    Measure {
        aggregate: Aggregate::Count,
        column: None,
        alias,
    }
}

const fn measure(aggregate: Aggregate, column: &'static str, alias: &'static str) -> Measure {
    Measure {
        aggregate,
        column: Some(column),
        alias,
    }
}

impl Measure {
    fn sql(&self) -> String {
        let column = self.column.unwrap_or("*");
        let expr = match self.aggregate {
            Aggregate::Count => format!("COUNT({column})"),
            Aggregate::Sum => format!("ROUND(SUM({column}), 2)"),
            Aggregate::Avg => format!("ROUND(AVG({column}), 2)"),
            Aggregate::Min => format!("MIN({column})"),
            Aggregate::Max => format!("MAX({column})"),
        };
        format!("{expr} AS {}", self.alias)
    }
}

/// Fixed boundaries; bucket `i` covers `[bounds[i-1], bounds[i])`.
#[derive(Debug, Clone, Copy)]
pub struct Buckets {
    pub bounds: &'static [f64],
    /// One more label than bounds; the last is the open-ended top bucket.
    pub labels: &'static [&'static str],
}

impl Buckets {
    fn case_sql(&self, column: &str) -> String {
        let arms = self
            .bounds
            .iter()
            .zip(self.labels)
            .map(|(bound, label)| format!("WHEN {column} < {bound} THEN '{label}'"))
            .join(" ");
        let top = self.labels.last().copied().unwrap_or("other");
        format!("CASE {arms} ELSE '{top}' END")
    }
}

#[derive(Debug, Clone, Copy)]
pub enum QueryShape {
    /// One row of headline numbers.
    Metrics { measures: &'static [Measure] },
    /// Aggregates per category, largest first.
    Grouped {
        group: &'static str,
        measures: &'static [Measure],
        order_by: &'static str,
        limit: Option<usize>,
    },
    /// Row counts per fixed numeric bucket, in bucket order.
    Histogram {
        column: &'static str,
        buckets: Buckets,
        count_alias: &'static str,
    },
    /// Aggregates per calendar month (`YYYY-MM`), oldest first.
    Monthly {
        date_column: &'static str,
        measures: &'static [Measure],
    },
    /// Aggregates per category and numeric bucket.
    CrossTab {
        group: &'static str,
        bucket_column: &'static str,
        bucket_alias: &'static str,
        buckets: Buckets,
        measures: &'static [Measure],
    },
}

#[derive(Debug, Clone, Copy)]
pub struct QuerySpec {
    pub name: &'static str,
    pub title: &'static str,
    pub shape: QueryShape,
    pub not_null: &'static [&'static str],
}

impl QuerySpec {
    pub fn is_top_n(&self) -> bool {
        matches!(self.shape, QueryShape::Grouped { limit: Some(_), .. })
    }

    /// Columns the dataset must have for this query to run.
    pub fn required_columns(&self) -> Vec<&'static str> {
        let mut columns = self.not_null.to_vec();
        let measures: &[Measure] = match self.shape {
            QueryShape::Metrics { measures } => measures,
            QueryShape::Grouped {
                group, measures, ..
            } => {
                columns.push(group);
                measures
            }
            QueryShape::Histogram { column, .. } => {
                columns.push(column);
                &[]
            }
            QueryShape::Monthly {
                date_column,
                measures,
            } => {
                columns.push(date_column);
                measures
            }
            QueryShape::CrossTab {
                group,
                bucket_column,
                measures,
                ..
            } => {
                columns.push(group);
                columns.push(bucket_column);
                measures
            }
        };
        columns.extend(measures.iter().filter_map(|m| m.column));
        columns.into_iter().unique().collect()
    }

    /// Renders the query; `limit` overrides the default of top-N queries.
    pub fn to_sql(&self, predicate: &Predicate, limit: Option<usize>) -> String {
        let mut conditions = vec![predicate.sql()];
        conditions.extend(self.not_null.iter().map(|c| format!("{c} IS NOT NULL")));
        let where_for = |extra: &[&str]| {
            conditions
                .iter()
                .cloned()
                .chain(extra.iter().map(|c| format!("{c} IS NOT NULL")))
                .unique()
                .join(" AND ")
        };
        let select = |measures: &[Measure]| measures.iter().map(Measure::sql).join(", ");

        match self.shape {
            // Aggregates without GROUP BY always yield a row; drop it when nothing matched.
            QueryShape::Metrics { measures } => format!(
                "SELECT {} FROM (SELECT {}, COUNT(*) AS matched_rows FROM {DATASET_TABLE} WHERE {}) \
                 WHERE matched_rows > 0",
                aliases(measures),
                select(measures),
                where_for(&[])
            ),
            QueryShape::Grouped {
                group,
                measures,
                order_by,
                limit: default_limit,
            } => {
                let mut sql = format!(
                    "SELECT {group}, {} FROM {DATASET_TABLE} WHERE {} GROUP BY {group} \
                     ORDER BY {order_by} DESC, {group} ASC",
                    select(measures),
                    where_for(&[group])
                );
                if let Some(n) = default_limit.map(|d| limit.unwrap_or(d)) {
                    sql.push_str(&format!(" LIMIT {n}"));
                }
                sql
            }
            QueryShape::Histogram {
                column,
                buckets,
                count_alias,
            } => {
                let bucket = buckets.case_sql(column);
                format!(
                    "SELECT {bucket} AS bucket, COUNT(*) AS {count_alias} FROM {DATASET_TABLE} \
                     WHERE {} GROUP BY {bucket} ORDER BY MIN({column}) ASC",
                    where_for(&[column])
                )
            }
            QueryShape::Monthly {
                date_column,
                measures,
            } => {
                let month = format!("strftime('%Y-%m', {date_column})");
                format!(
                    "SELECT {month} AS month, {} FROM {DATASET_TABLE} WHERE {} \
                     GROUP BY {month} ORDER BY 1 ASC",
                    select(measures),
                    where_for(&[date_column])
                )
            }
            QueryShape::CrossTab {
                group,
                bucket_column,
                bucket_alias,
                buckets,
                measures,
            } => {
                let bucket = buckets.case_sql(bucket_column);
                format!(
                    "SELECT {group}, {bucket} AS {bucket_alias}, {} FROM {DATASET_TABLE} WHERE {} \
                     GROUP BY {group}, {bucket} ORDER BY {group} ASC, MIN({bucket_column}) ASC",
                    select(measures),
                    where_for(&[group, bucket_column])
                )
            }
        }
    }

    pub fn run(
        &self,
        store: &DatasetStore,
        predicate: &Predicate,
        limit: Option<usize>,
    ) -> Result<QueryResult> {
        store.query_with(&self.to_sql(predicate, limit), predicate.params())
    }
}

fn aliases(measures: &[Measure]) -> String {
    measures.iter().map(|m| m.alias).join(", ")
}

const PRICE_BUCKETS: Buckets = Buckets {
    bounds: &[50.0, 100.0, 150.0, 200.0, 300.0, 500.0],
    labels: &[
        "under 50", "50-100", "100-150", "150-200", "200-300", "300-500", "500+",
    ],
};

const AVAILABILITY_BUCKETS: Buckets = Buckets {
    bounds: &[1.0, 91.0, 181.0, 271.0],
    labels: &["none", "1-90", "91-180", "181-270", "271-365"],
};

const AMOUNT_BUCKETS: Buckets = Buckets {
    bounds: &[50.0, 100.0, 250.0, 500.0, 1000.0],
    labels: &["under 50", "50-100", "100-250", "250-500", "500-1000", "1000+"],
};

const AGE_BUCKETS: Buckets = Buckets {
    bounds: &[18.0, 26.0, 36.0, 46.0, 56.0, 66.0],
    labels: &[
        "under 18", "18-25", "26-35", "36-45", "46-55", "56-65", "66+",
    ],
};

const RENTAL_QUERIES: &[QuerySpec] = &[
    QuerySpec {
        name: "overview",
        title: "Listings overview",
        shape: QueryShape::Metrics {
            measures: &[
                count("listing_count"),
                measure(Aggregate::Avg, "price", "avg_price"),
                measure(Aggregate::Min, "price", "min_price"),
                measure(Aggregate::Max, "price", "max_price"),
            ],
        },
        not_null: &["price"],
    },
    QuerySpec {
        name: "avg_price_by_room_type",
        title: "Average price by room type",
        shape: QueryShape::Grouped {
            group: "room_type",
            measures: &[
                count("listing_count"),
                measure(Aggregate::Avg, "price", "avg_price"),
            ],
            order_by: "avg_price",
            limit: None,
        },
        not_null: &["price"],
    },
    QuerySpec {
        name: "listings_by_neighbourhood_group",
        title: "Listings by neighbourhood group",
        shape: QueryShape::Grouped {
            group: "neighbourhood_group",
            measures: &[count("listing_count")],
            order_by: "listing_count",
            limit: None,
        },
        not_null: &[],
    },
    QuerySpec {
        name: "top_neighbourhoods_by_price",
        title: "Most expensive neighbourhoods",
        shape: QueryShape::Grouped {
            group: "neighbourhood",
            measures: &[
                count("listing_count"),
                measure(Aggregate::Avg, "price", "avg_price"),
            ],
            order_by: "avg_price",
            limit: Some(10),
        },
        not_null: &["price"],
    },
    QuerySpec {
        name: "price_distribution",
        title: "Nightly price distribution",
        shape: QueryShape::Histogram {
            column: "price",
            buckets: PRICE_BUCKETS,
            count_alias: "listing_count",
        },
        not_null: &["price"],
    },
    QuerySpec {
        name: "reviews_by_month",
        title: "Listings by month of last review",
        shape: QueryShape::Monthly {
            date_column: "last_review",
            measures: &[
                count("listing_count"),
                measure(Aggregate::Avg, "reviews_per_month", "avg_reviews_per_month"),
            ],
        },
        not_null: &["last_review"],
    },
    QuerySpec {
        name: "room_type_by_availability",
        title: "Room type by yearly availability",
        shape: QueryShape::CrossTab {
            group: "room_type",
            bucket_column: "availability_365",
            bucket_alias: "availability",
            buckets: AVAILABILITY_BUCKETS,
            measures: &[
                count("listing_count"),
                measure(Aggregate::Avg, "price", "avg_price"),
            ],
        },
        not_null: &["price"],
    },
];

const RETAIL_QUERIES: &[QuerySpec] = &[
    QuerySpec {
        name: "overview",
        title: "Sales overview",
        shape: QueryShape::Metrics {
            measures: &[
                count("transaction_count"),
                measure(Aggregate::Sum, "total_amount", "total_revenue"),
                measure(Aggregate::Avg, "total_amount", "avg_basket"),
            ],
        },
        not_null: &["total_amount"],
    },
    QuerySpec {
        name: "revenue_by_category",
        title: "Revenue by product category",
        shape: QueryShape::Grouped {
            group: "product_category",
            measures: &[
                count("transaction_count"),
                measure(Aggregate::Sum, "total_amount", "total_revenue"),
            ],
            order_by: "total_revenue",
            limit: None,
        },
        not_null: &["total_amount"],
    },
    QuerySpec {
        name: "avg_amount_by_gender",
        title: "Average basket by gender",
        shape: QueryShape::Grouped {
            group: "gender",
            measures: &[
                count("transaction_count"),
                measure(Aggregate::Avg, "total_amount", "avg_amount"),
            ],
            order_by: "avg_amount",
            limit: None,
        },
        not_null: &["total_amount"],
    },
    QuerySpec {
        name: "top_regions_by_revenue",
        title: "Top regions by revenue",
        shape: QueryShape::Grouped {
            group: "region",
            measures: &[
                count("transaction_count"),
                measure(Aggregate::Sum, "total_amount", "total_revenue"),
            ],
            order_by: "total_revenue",
            limit: Some(10),
        },
        not_null: &["total_amount"],
    },
    QuerySpec {
        name: "amount_distribution",
        title: "Transaction amount distribution",
        shape: QueryShape::Histogram {
            column: "total_amount",
            buckets: AMOUNT_BUCKETS,
            count_alias: "transaction_count",
        },
        not_null: &["total_amount"],
    },
    QuerySpec {
        name: "monthly_revenue",
        title: "Monthly revenue",
        shape: QueryShape::Monthly {
            date_column: "date",
            measures: &[
                count("transaction_count"),
                measure(Aggregate::Sum, "total_amount", "total_revenue"),
            ],
        },
        not_null: &["total_amount"],
    },
    QuerySpec {
        name: "category_by_age_group",
        title: "Product category by age group",
        shape: QueryShape::CrossTab {
            group: "product_category",
            bucket_column: "age",
            bucket_alias: "age_group",
            buckets: AGE_BUCKETS,
            measures: &[
                count("transaction_count"),
                measure(Aggregate::Avg, "total_amount", "avg_amount"),
            ],
        },
        not_null: &["total_amount"],
    },
];

pub fn catalog(variant: Variant) -> &'static [QuerySpec] {
    match variant {
        Variant::Rental => RENTAL_QUERIES,
        Variant::Retail => RETAIL_QUERIES,
        Variant::Unrecognized => &[],
    }
}

pub fn find(variant: Variant, name: &str) -> Option<&'static QuerySpec> {
    catalog(variant).iter().find(|spec| spec.name == name)
}
