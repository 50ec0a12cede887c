pub mod cli;
pub mod data;
pub mod describe;
pub mod error;
pub mod filter;
pub mod io_utils;
pub mod load;
pub mod normalize;
pub mod queries;
pub mod report;
pub mod schema;
pub mod session;
pub mod store;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands};

pub use crate::{
    data::{RawTable, Value},
    error::DashboardError,
    filter::{FilterSet, FilterValue, Predicate, build_predicate},
    schema::{Variant, detect},
    session::{Dashboard, NamedResult, RunOptions},
    store::{DatasetStore, QueryResult},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_dashboard", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Load(args) => load::execute(&args),
        Commands::Describe(args) => describe::execute(&args),
        Commands::Report(args) => report::execute(&args),
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
