use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

pub const DEFAULT_DB_PATH: &str = "database/dashboard.sqlite";

#[derive(Debug, Parser)]
#[command(author, version, about = "Upload a CSV and explore it through a fixed set of reports", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Detect the dataset type of a CSV file, normalize it and make it the active dataset
    Load(LoadArgs),
    /// Describe the active dataset, its filter options and available reports
    Describe(DescribeArgs),
    /// Run catalog reports against the active dataset
    Report(ReportArgs),
}

#[derive(Debug, Args)]
pub struct StoreArgs {
    /// Database file holding the active dataset
    #[arg(long = "db", env = "CSV_DASHBOARD_DB", default_value = DEFAULT_DB_PATH)]
    pub db: PathBuf,
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    /// Input CSV file to load ('-' reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    #[command(flatten)]
    pub store: StoreArgs,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct DescribeArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    /// Report to run (repeatable; all available reports when omitted)
    #[arg(short = 'q', long = "query", action = clap::ArgAction::Append)]
    pub queries: Vec<String>,
    /// Categorical selection `key=value` (repeat the key to allow several values)
    #[arg(long = "filter", action = clap::ArgAction::Append)]
    pub filters: Vec<String>,
    /// Inclusive date range `key=FROM..TO`; either end may be left blank
    #[arg(long = "range", action = clap::ArgAction::Append)]
    pub ranges: Vec<String>,
    /// Row limit for top-N reports
    #[arg(long)]
    pub top: Option<usize>,
    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
