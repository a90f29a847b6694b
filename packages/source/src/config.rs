//! Data-source configuration loading.
//!
//! The config file is TOML with one `[[sources]]` table per city:
//!
//! ```toml
//! [[sources]]
//! city = "Bordeaux"
//! url = "https://example.org/bordeaux.csv"
//! download_type = "single_file"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use velocity_db_source_models::{DataSourceConfig, DownloadKind};

use crate::registry::ParserRegistry;

/// Errors that can occur while loading the data-source config.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The caller passed an unusable argument.
    #[error("{0}")]
    InvalidArgument(String),

    /// The config file does not exist.
    #[error("File not found: {path}")]
    NotFound {
        /// Path that was looked up.
        path: String,
    },

    /// The config file could not be read.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// Config file path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has the wrong shape.
    #[error("Invalid config file {path}: {source}")]
    Toml {
        /// Config file path.
        path: String,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// A source names a download type that does not exist.
    #[error("Unknown download_type '{value}' for city {city}")]
    InvalidDownloadType {
        /// City of the offending entry.
        city: String,
        /// Value found in the file.
        value: String,
    },
}

#[derive(Debug, Deserialize)]
struct DataSourcesFile {
    #[serde(default)]
    sources: Vec<SourceEntry>,
}

#[derive(Debug, Deserialize)]
struct SourceEntry {
    city: String,
    url: String,
    download_type: String,
}

/// Loads the data sources listed in the config file at `config_path`.
///
/// Each city's CSV file is targeted at `{target_directory}/{city}.csv` and
/// parsed with the parser registered under the city's name. Cities without
/// a registered parser are dropped with a warning. Entries keep their order
/// from the file.
///
/// # Errors
///
/// * [`ConfigError::InvalidArgument`] if either path is empty, before any I/O
/// * [`ConfigError::NotFound`] or [`ConfigError::Io`] if the file cannot be
///   read
/// * [`ConfigError::Toml`] if the file is malformed
/// * [`ConfigError::InvalidDownloadType`] for an unknown `download_type`
pub fn load_data_sources(
    config_path: &Path,
    target_directory: &Path,
    registry: &ParserRegistry,
) -> Result<Vec<DataSourceConfig>, ConfigError> {
    if config_path.as_os_str().is_empty() {
        return Err(ConfigError::InvalidArgument(
            "Please provide a path for the data source config file".to_string(),
        ));
    }
    if target_directory.as_os_str().is_empty() {
        return Err(ConfigError::InvalidArgument(
            "Please provide an absolute path for the CSV target files directory".to_string(),
        ));
    }

    log::info!("Loading data sources config file {}", config_path.display());

    let path = config_path.display().to_string();
    let content = std::fs::read_to_string(config_path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound { path: path.clone() }
        } else {
            ConfigError::Io {
                path: path.clone(),
                source,
            }
        }
    })?;

    let file: DataSourcesFile =
        toml::from_str(&content).map_err(|source| ConfigError::Toml { path, source })?;

    let mut configs = Vec::with_capacity(file.sources.len());
    let mut unsupported = Vec::new();

    for entry in file.sources {
        let download_kind: DownloadKind =
            entry
                .download_type
                .parse()
                .map_err(|_| ConfigError::InvalidDownloadType {
                    city: entry.city.clone(),
                    value: entry.download_type.clone(),
                })?;

        if !registry.supports(&entry.city) {
            unsupported.push(entry.city);
            continue;
        }

        configs.push(DataSourceConfig {
            target_file_path: target_file_path(target_directory, &entry.city),
            parser_selector: entry.city.clone(),
            city: entry.city,
            source_url: entry.url,
            download_kind,
        });
    }

    if !unsupported.is_empty() {
        log::warn!(
            "The following cities listed in {} will be ignored as they have no CSV parser: {}",
            config_path.display(),
            unsupported.join(", ")
        );
    }

    Ok(configs)
}

fn target_file_path(target_directory: &Path, city: &str) -> PathBuf {
    target_directory.join(format!("{city}.csv"))
}
