use anyhow::{Context, Result};
use log::info;

use crate::{cli::LoadArgs, io_utils, printable_delimiter, session::Dashboard, table};

pub fn execute(args: &LoadArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!(
        "Reading '{}' with delimiter '{}'",
        args.input.display(),
        printable_delimiter(delimiter)
    );
    let raw = io_utils::read_raw_table_from_path(&args.input, delimiter, encoding)
        .with_context(|| format!("Reading {:?}", args.input))?;
    let mut dashboard = Dashboard::open(&args.store.db)
        .with_context(|| format!("Opening dataset store {:?}", args.store.db))?;
    let source = args.input.display().to_string();
    let summary = dashboard
        .load(&raw, &source)
        .with_context(|| format!("Loading {:?}", args.input))?;

    println!(
        "Loaded {} dataset: {} row(s)",
        summary.variant, summary.row_count
    );
    let headers = ["column", "type", "nulls_before", "nulls_after"]
        .map(String::from)
        .to_vec();
    let rows = summary
        .report
        .transforms
        .iter()
        .map(|t| {
            vec![
                t.column.clone(),
                format!("{:?}", t.semantic).to_lowercase(),
                t.nulls_before.to_string(),
                t.nulls_after.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    if !rows.is_empty() {
        table::print_table(&headers, &rows);
    }
    for rename in &summary.report.renamed {
        println!("Column '{}' stored as '{}'", rename.from, rename.to);
    }
    for skipped in &summary.report.skipped {
        println!("Column '{skipped}' not present; dependent reports are unavailable");
    }
    info!(
        "Dataset {} stored in {:?}",
        &summary.fingerprint[..12.min(summary.fingerprint.len())],
        args.store.db
    );
    Ok(())
}
