#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Download-and-ingest pipeline for bicycle traffic open data.
//!
//! [`run`] loads the data-source config, downloads the CSV files that are
//! missing (or all of them when asked to), then parses every city's file
//! into the `DuckDB` database.

use std::path::{Path, PathBuf};

use velocity_db_database::{DatabaseManager, DbError};
use velocity_db_download::{DEFAULT_PAGE_SIZE, ParallelDownloadCoordinator};
use velocity_db_source::config::{ConfigError, load_data_sources};
use velocity_db_source::registry::{ParserRegistry, RegistryError};
use velocity_db_source::ParseSummary;
use velocity_db_source_models::{DataSourceConfig, IngestError};

/// Errors that abort a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The data-source config could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The database could not be opened, deleted or queried.
    #[error(transparent)]
    Database(#[from] DbError),

    /// A configured city has no parser.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The data directory could not be created.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The blocking ingestion task panicked.
    #[error("Ingestion task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Options of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    /// Directory holding the downloaded CSV files and the database.
    pub data_directory_path: PathBuf,
    /// Data-source config file.
    pub config_path: PathBuf,
    /// Re-download CSV files that already exist.
    pub override_csv_files: bool,
    /// Delete the database before ingesting.
    pub delete_existing_database: bool,
    /// Records per page for paginated sources.
    pub page_size: u64,
}

impl IngestOptions {
    /// Options with the defaults of the command line.
    #[must_use]
    pub fn new(data_directory_path: impl Into<PathBuf>) -> Self {
        Self {
            data_directory_path: data_directory_path.into(),
            config_path: PathBuf::from("data-sources.toml"),
            override_csv_files: false,
            delete_existing_database: true,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// How one city fared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CityOutcome {
    /// The file was parsed and ingested.
    Ingested(ParseSummary),
    /// There was no CSV file to parse.
    MissingFile,
    /// Parsing or ingestion failed; the message is the error.
    Failed(String),
}

/// Result of one city in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityReport {
    pub city: String,
    pub outcome: CityOutcome,
    /// Measurements stored for the city once the run is over.
    pub stored_measurements: u64,
}

/// Result of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Whether every attempted download succeeded. `true` when nothing had
    /// to be downloaded.
    pub downloads_succeeded: bool,
    /// One report per configured city, in config order.
    pub cities: Vec<CityReport>,
}

/// Runs the whole pipeline.
///
/// A failed download or a city whose file cannot be parsed is logged and
/// does not stop the run.
///
/// # Errors
///
/// Returns [`PipelineError`] if the config cannot be loaded, the data
/// directory cannot be created or the database cannot be opened.
pub async fn run(options: &IngestOptions) -> Result<RunSummary, PipelineError> {
    let registry = ParserRegistry::with_default_parsers();
    let configs = load_data_sources(
        &options.config_path,
        &options.data_directory_path,
        &registry,
    )?;

    log::info!("Loaded {} data sources", configs.len());

    tokio::fs::create_dir_all(&options.data_directory_path)
        .await
        .map_err(|source| PipelineError::Io {
            path: options.data_directory_path.display().to_string(),
            source,
        })?;

    let downloads_succeeded = download_missing(options, &configs).await;

    let data_directory = options.data_directory_path.clone();
    let delete_existing_database = options.delete_existing_database;

    let cities = tokio::task::spawn_blocking(move || {
        ingest_all(&data_directory, delete_existing_database, &configs, &registry)
    })
    .await??;

    Ok(RunSummary {
        downloads_succeeded,
        cities,
    })
}

/// Downloads the sources whose file is absent, or every source when
/// overriding.
async fn download_missing(options: &IngestOptions, configs: &[DataSourceConfig]) -> bool {
    let to_download: Vec<DataSourceConfig> = configs
        .iter()
        .filter(|config| options.override_csv_files || !config.target_file_path.exists())
        .cloned()
        .collect();

    if to_download.is_empty() {
        log::info!("All CSV files are present, skipping downloads");
        return true;
    }

    log::info!("Downloading {} CSV files", to_download.len());

    let coordinator = ParallelDownloadCoordinator::with_page_size(options.page_size);
    let succeeded = coordinator.download_all(&to_download).await;

    if !succeeded {
        log::warn!("Some CSV files could not be downloaded");
    }

    succeeded
}

fn ingest_all(
    data_directory: &Path,
    delete_existing_database: bool,
    configs: &[DataSourceConfig],
    registry: &ParserRegistry,
) -> Result<Vec<CityReport>, PipelineError> {
    if delete_existing_database {
        DatabaseManager::delete_database(data_directory)?;
    }
    let mut db = DatabaseManager::open(data_directory)?;

    let total = configs.len();
    let mut outcomes = Vec::with_capacity(total);

    for (i, config) in configs.iter().enumerate() {
        log::info!("Ingesting city {}/{total}: {}", i + 1, config.city);

        let outcome = ingest_city(&mut db, config, registry)?;
        outcomes.push((config.city.clone(), outcome));
    }

    let mut reports = Vec::with_capacity(outcomes.len());
    for (city, outcome) in outcomes {
        let stored_measurements = db.count_measurements_for_city(&city)?;
        log::info!("{city}: {stored_measurements} measurements stored");

        reports.push(CityReport {
            city,
            outcome,
            stored_measurements,
        });
    }

    Ok(reports)
}

fn ingest_city(
    db: &mut DatabaseManager,
    config: &DataSourceConfig,
    registry: &ParserRegistry,
) -> Result<CityOutcome, PipelineError> {
    if !config.target_file_path.exists() {
        log::warn!(
            "No CSV file for city {} at {}, skipping",
            config.city,
            config.target_file_path.display()
        );
        return Ok(CityOutcome::MissingFile);
    }

    let parser = registry.get(&config.parser_selector)?;
    let file_path = config.target_file_path.to_string_lossy();

    let result = parser.parse_and_ingest(&file_path, |batch| {
        db.ingest(batch)
            .map(|_| ())
            .map_err(|e| -> IngestError { Box::new(e) })
    });

    Ok(match result {
        Ok(summary) => CityOutcome::Ingested(summary),
        Err(e) => {
            log::error!("Failed to ingest {}: {e}", config.city);
            CityOutcome::Failed(e.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RENNES_CSV: &str = "date;counts;name\n\
                              2023-08-11T10:00:00+02:00;32;Rue d'Isly\n\
                              2023-08-11T11:00:00+02:00;;Rue d'Isly\n";

    struct Fixture {
        _dir: tempfile::TempDir,
        options: IngestOptions,
    }

    /// A data directory with a config listing `sources` as
    /// `(city, url, download_type)`.
    fn fixture(sources: &[(&str, &str, &str)]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let data_directory = dir.path().join("data");
        std::fs::create_dir_all(&data_directory).unwrap();

        let mut config = String::new();
        for (city, url, download_type) in sources {
            config.push_str(&format!(
                "[[sources]]\ncity = \"{city}\"\nurl = \"{url}\"\ndownload_type = \"{download_type}\"\n\n"
            ));
        }
        let config_path = dir.path().join("data-sources.toml");
        std::fs::write(&config_path, config).unwrap();

        let mut options = IngestOptions::new(data_directory);
        options.config_path = config_path;

        Fixture { _dir: dir, options }
    }

    #[tokio::test]
    async fn ingests_existing_csv_files_without_downloading() {
        let fixture = fixture(&[
            ("Rennes", "http://127.0.0.1:1/rennes.csv", "single_file"),
            ("Lyon", "http://127.0.0.1:1/lyon.csv", "single_file"),
        ]);
        std::fs::write(
            fixture.options.data_directory_path.join("Rennes.csv"),
            RENNES_CSV,
        )
        .unwrap();

        let summary = run(&fixture.options).await.unwrap();

        assert!(summary.downloads_succeeded);
        assert_eq!(
            summary.cities,
            vec![CityReport {
                city: "Rennes".to_string(),
                outcome: CityOutcome::Ingested(ParseSummary {
                    rows_read: 2,
                    measurements: 2,
                    batches: 1,
                }),
                stored_measurements: 2,
            }]
        );
    }

    #[tokio::test]
    async fn skips_city_whose_download_failed() {
        let fixture = fixture(&[
            ("Paris", "http://127.0.0.1:1/paris.csv", "single_file"),
            ("Rennes", "http://127.0.0.1:1/rennes.csv", "single_file"),
        ]);
        std::fs::write(
            fixture.options.data_directory_path.join("Rennes.csv"),
            RENNES_CSV,
        )
        .unwrap();

        let summary = run(&fixture.options).await.unwrap();

        assert!(!summary.downloads_succeeded);
        assert_eq!(summary.cities[0].outcome, CityOutcome::MissingFile);
        assert_eq!(summary.cities[0].stored_measurements, 0);
        assert_eq!(summary.cities[1].stored_measurements, 2);
    }

    #[tokio::test]
    async fn failed_redownload_does_not_ingest_previous_file() {
        let mut fixture = fixture(&[("Rennes", "http://127.0.0.1:1/rennes.csv", "single_file")]);
        let csv_path = fixture.options.data_directory_path.join("Rennes.csv");
        std::fs::write(&csv_path, RENNES_CSV).unwrap();
        fixture.options.override_csv_files = true;

        let summary = run(&fixture.options).await.unwrap();

        assert!(!summary.downloads_succeeded);
        assert_eq!(summary.cities[0].outcome, CityOutcome::MissingFile);
        assert_eq!(summary.cities[0].stored_measurements, 0);
        assert!(!csv_path.exists());
    }

    #[tokio::test]
    async fn keeps_going_after_unparseable_file() {
        let fixture = fixture(&[
            ("Strasbourg", "http://127.0.0.1:1/strasbourg.csv", "single_file"),
            ("Rennes", "http://127.0.0.1:1/rennes.csv", "single_file"),
        ]);
        let data_directory = &fixture.options.data_directory_path;
        std::fs::write(data_directory.join("Strasbourg.csv"), "date,sum_counts\n").unwrap();
        std::fs::write(data_directory.join("Rennes.csv"), RENNES_CSV).unwrap();

        let summary = run(&fixture.options).await.unwrap();

        assert!(matches!(summary.cities[0].outcome, CityOutcome::Failed(_)));
        assert_eq!(summary.cities[1].stored_measurements, 2);
    }

    #[tokio::test]
    async fn keeps_or_replaces_existing_database() {
        let mut fixture = fixture(&[("Rennes", "http://127.0.0.1:1/rennes.csv", "single_file")]);
        std::fs::write(
            fixture.options.data_directory_path.join("Rennes.csv"),
            RENNES_CSV,
        )
        .unwrap();

        run(&fixture.options).await.unwrap();

        fixture.options.delete_existing_database = false;
        let summary = run(&fixture.options).await.unwrap();
        assert_eq!(summary.cities[0].stored_measurements, 4);

        fixture.options.delete_existing_database = true;
        let summary = run(&fixture.options).await.unwrap();
        assert_eq!(summary.cities[0].stored_measurements, 2);
    }

    #[tokio::test]
    async fn fails_on_missing_config() {
        let options = IngestOptions {
            config_path: PathBuf::from("/definitely/not/here.toml"),
            ..IngestOptions::new("/tmp/velocity-db-unused")
        };

        assert!(matches!(
            run(&options).await,
            Err(PipelineError::Config(ConfigError::NotFound { .. }))
        ));
    }
}
