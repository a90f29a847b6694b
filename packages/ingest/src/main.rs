#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the bicycle traffic ingestion tool.

use std::path::PathBuf;
use std::time::Instant;

use clap::{ArgAction, Parser};
use velocity_db_download::DEFAULT_PAGE_SIZE;
use velocity_db_ingest::{CityOutcome, IngestOptions, run};

#[derive(Parser)]
#[command(
    name = "velocity_db_ingest",
    about = "Downloads bicycle traffic open data and loads it into DuckDB"
)]
struct Cli {
    /// Directory for the downloaded CSV files and the database
    #[arg(long)]
    data_directory_path: PathBuf,
    /// Data-source configuration file
    #[arg(long, default_value = "data-sources.toml")]
    config: PathBuf,
    /// Re-download CSV files that already exist
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    override_csv_files: bool,
    /// Delete the database before ingesting
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    delete_existing_database: bool,
    /// Records per page for paginated sources
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: u64,
}

impl From<Cli> for IngestOptions {
    fn from(cli: Cli) -> Self {
        Self {
            data_directory_path: cli.data_directory_path,
            config_path: cli.config,
            override_csv_files: cli.override_csv_files,
            delete_existing_database: cli.delete_existing_database,
            page_size: cli.page_size,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let options = IngestOptions::from(Cli::parse());

    let start = Instant::now();
    let summary = run(&options).await?;

    let failed: Vec<&str> = summary
        .cities
        .iter()
        .filter(|report| !matches!(report.outcome, CityOutcome::Ingested(_)))
        .map(|report| report.city.as_str())
        .collect();

    log::info!(
        "Ingestion complete: {} cities in {:.1}s",
        summary.cities.len(),
        start.elapsed().as_secs_f64()
    );
    if !failed.is_empty() {
        log::warn!("Cities without new data: {}", failed.join(", "));
    }

    Ok(())
}
