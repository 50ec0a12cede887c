use anyhow::{Context, Result};
use log::{debug, info};

use crate::{
    cli::{OutputFormat, ReportArgs},
    filter::FilterSet,
    session::{Dashboard, NamedResult, RunOptions},
    table,
};

pub fn execute(args: &ReportArgs) -> Result<()> {
    let dashboard = Dashboard::open(&args.store.db)
        .with_context(|| format!("Opening dataset store {:?}", args.store.db))?;
    let filters = FilterSet::parse(&args.filters, &args.ranges)?;
    let options = RunOptions { top: args.top };
    debug!("Filters: {filters:?}");

    let results = if args.queries.is_empty() {
        dashboard.run_all(&filters, &options)?
    } else {
        args.queries
            .iter()
            .map(|name| {
                dashboard
                    .run_query(name, &filters, &options)
                    .with_context(|| format!("Running report '{name}'"))
            })
            .collect::<Result<Vec<_>>>()?
    };

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        OutputFormat::Table => print_results(&results),
    }
    info!(
        "Ran {} report(s) against the {} dataset",
        results.len(),
        dashboard.variant()
    );
    Ok(())
}

fn print_results(results: &[NamedResult]) {
    for (idx, named) in results.iter().enumerate() {
        if idx > 0 {
            println!();
        }
        println!("== {} ({}) ==", named.title, named.name);
        if named.result.is_empty() {
            println!("(no matching rows)");
        } else {
            table::print_result(&named.result);
        }
    }
}
