#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Data source configuration types and the canonical traffic measurement
//! format.
//!
//! Every city feed (plain CSV export, Socrata batch API, etc.) is parsed into
//! [`Measurement`] records, which is the only shape the ingestion sink ever
//! sees.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use strum_macros::{Display, EnumString};

/// How the CSV file of a data source is fetched.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum DownloadKind {
    /// One HTTP GET streamed straight to the target file.
    SingleFile,
    /// Socrata-style `$limit`/`$offset` pages stitched into one file.
    PaginatedBatch,
}

/// A single data source to download and ingest, resolved from the
/// data-sources config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourceConfig {
    /// City name (e.g., `"Bordeaux"`).
    pub city: String,
    /// URL of the CSV export or the base URL of the batch API.
    pub source_url: String,
    /// Whether the source is fetched in one request or page by page.
    pub download_kind: DownloadKind,
    /// Where the downloaded CSV file is written.
    pub target_file_path: PathBuf,
    /// Key of the CSV parser in the parser registry.
    pub parser_selector: String,
}

/// One hourly traffic count at a counting location, normalized across all
/// sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measurement {
    /// City the counter belongs to.
    pub city: String,
    /// Counter name or identifier. May be empty.
    pub location_name: String,
    /// Number of bicycles counted during the hour. Sources are trusted as-is,
    /// so negative values are passed through.
    pub hourly_traffic_count: i32,
    /// Start of the counted hour.
    pub timestamp: DateTime<Utc>,
}

impl Measurement {
    /// Creates a new measurement.
    #[must_use]
    pub fn new(
        city: impl Into<String>,
        location_name: impl Into<String>,
        hourly_traffic_count: i32,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            city: city.into(),
            location_name: location_name.into(),
            hourly_traffic_count,
            timestamp,
        }
    }
}

/// Error returned by an ingestion sink when a batch cannot be persisted.
pub type IngestError = Box<dyn std::error::Error + Send + Sync>;
