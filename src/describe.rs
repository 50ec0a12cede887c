use anyhow::{Context, Result};
use itertools::Itertools;
use serde::Serialize;

use crate::{
    cli::{DescribeArgs, OutputFormat},
    session::{ActiveDataset, Dashboard, FilterOptions},
    store::ColumnInfo,
    table,
};

#[derive(Debug, Serialize)]
struct Description<'a> {
    dataset: &'a ActiveDataset,
    columns: Vec<ColumnInfo>,
    filters: FilterOptions,
    queries: Vec<&'static str>,
}

pub fn execute(args: &DescribeArgs) -> Result<()> {
    let dashboard = Dashboard::open(&args.store.db)
        .with_context(|| format!("Opening dataset store {:?}", args.store.db))?;
    let Some(active) = dashboard.active() else {
        anyhow::bail!("No dataset has been loaded into {:?}", args.store.db);
    };
    let description = Description {
        dataset: active,
        columns: dashboard.store().describe()?.columns,
        filters: dashboard.filter_options()?,
        queries: dashboard
            .available_queries()
            .into_iter()
            .map(|spec| spec.name)
            .collect(),
    };

    match args.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&description)?);
        }
        OutputFormat::Table => print_description(&description),
    }
    Ok(())
}

fn print_description(description: &Description<'_>) {
    let dataset = description.dataset;
    println!(
        "{} dataset, {} row(s), loaded from '{}' at {}",
        dataset.variant, dataset.row_count, dataset.metadata.source, dataset.metadata.loaded_at
    );
    println!();
    let rows = description
        .columns
        .iter()
        .map(|c| vec![c.name.clone(), c.sql_type.clone()])
        .collect::<Vec<_>>();
    table::print_table(&["column".to_string(), "type".to_string()], &rows);

    println!();
    let mut filter_rows = description
        .filters
        .categorical
        .iter()
        .map(|(key, values)| {
            vec![
                key.clone(),
                format!("{} value(s)", values.len()),
                values.iter().take(8).join(", "),
            ]
        })
        .collect::<Vec<_>>();
    filter_rows.extend(description.filters.date_bounds.iter().map(|(key, bounds)| {
        let show = |d: Option<chrono::NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();
        vec![
            key.clone(),
            "date range".to_string(),
            format!("{}..{}", show(bounds.min), show(bounds.max)),
        ]
    }));
    table::print_table(
        &["filter".to_string(), "kind".to_string(), "options".to_string()],
        &filter_rows,
    );

    println!();
    println!("Reports: {}", description.queries.join(", "));
}
