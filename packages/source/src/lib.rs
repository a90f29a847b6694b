#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! City CSV parsers for bicycle traffic counts.
//!
//! Each open-data export has its own delimiter, column names and date
//! format. A [`CsvParser`] reads one export, normalizes every row into
//! [`Measurement`]s and hands them to an ingestion sink in batches of
//! [`batch::INGESTION_BATCH_SIZE`].

pub mod batch;
pub mod config;
pub mod parsing;
pub mod registry;
pub mod row;
pub mod sources;

use chrono_tz::Europe;
use velocity_db_source_models::{IngestError, Measurement};

use crate::batch::MeasurementBatch;
use crate::row::{CsvRow, Header, decode_record};
use crate::sources::socrata::SocrataCityInfo;
use crate::sources::{Columns, bordeaux, nantes, paris, rennes, socrata, strasbourg};

/// Errors that can occur while parsing and ingesting a CSV file.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The caller passed an unusable argument.
    #[error("{0}")]
    InvalidArgument(String),

    /// The file could not be opened or read as CSV.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// File being parsed.
        path: String,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// The header lacks a column the layout needs, which usually means the
    /// file uses another delimiter.
    #[error("Missing column '{column}' in {path}")]
    MissingColumn {
        /// Expected column name.
        column: String,
        /// File being parsed.
        path: String,
    },

    /// The ingestion sink rejected a batch.
    #[error("Ingestion failed: {0}")]
    Ingest(#[source] IngestError),
}

/// What a call to [`CsvParser::parse_and_ingest`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseSummary {
    /// Data rows read, excluding the header.
    pub rows_read: u64,
    /// Measurements handed to the sink.
    pub measurements: u64,
    /// Number of sink calls.
    pub batches: u64,
}

/// One parser per supported export layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsvParser {
    Bordeaux,
    Nantes,
    Paris,
    Rennes,
    Strasbourg,
    /// A Socrata-served city, e.g. Camden.
    Socrata(SocrataCityInfo),
}

impl CsvParser {
    /// The Camden (London) Socrata export.
    #[must_use]
    pub fn camden() -> Self {
        Self::Socrata(SocrataCityInfo::new("Camden", Europe::London))
    }

    /// City the measurements are attributed to.
    #[must_use]
    pub fn city(&self) -> &str {
        match self {
            Self::Bordeaux => bordeaux::CITY,
            Self::Nantes => nantes::CITY,
            Self::Paris => paris::CITY,
            Self::Rennes => rennes::CITY,
            Self::Strasbourg => strasbourg::CITY,
            Self::Socrata(info) => &info.city_name,
        }
    }

    /// Field delimiter of the export.
    #[must_use]
    pub const fn delimiter(&self) -> u8 {
        match self {
            Self::Socrata(_) => b',',
            Self::Bordeaux | Self::Nantes | Self::Paris | Self::Rennes | Self::Strasbourg => b';',
        }
    }

    /// Columns a header must have for the file to be parsed: the timestamp
    /// column, and the location column under any of its spellings.
    const fn required_columns(&self) -> (&'static str, &'static [&'static str]) {
        const fn of(columns: &Columns) -> (&'static str, &'static [&'static str]) {
            (columns.timestamp, columns.location)
        }

        match self {
            Self::Bordeaux => of(&bordeaux::COLUMNS),
            Self::Nantes => (nantes::DAY_COLUMN, nantes::LOCATION_COLUMNS),
            Self::Paris => of(&paris::COLUMNS),
            Self::Rennes => of(&rennes::COLUMNS),
            Self::Strasbourg => of(&strasbourg::COLUMNS),
            Self::Socrata(_) => of(&socrata::COLUMNS),
        }
    }

    /// Column a row is filtered on, which the header must also have.
    const fn filter_column(&self) -> Option<&'static str> {
        match self {
            Self::Bordeaux => Some(bordeaux::TYPE_COLUMN),
            Self::Nantes | Self::Paris | Self::Rennes | Self::Strasbourg | Self::Socrata(_) => None,
        }
    }

    fn parse_row(&self, row: &CsvRow<'_>, out: &mut Vec<Measurement>) {
        match self {
            Self::Bordeaux => bordeaux::parse_row(row, out),
            Self::Nantes => nantes::parse_row(row, out),
            Self::Paris => paris::parse_row(row, out),
            Self::Rennes => rennes::parse_row(row, out),
            Self::Strasbourg => strasbourg::parse_row(row, out),
            Self::Socrata(info) => socrata::parse_row(info, row, out),
        }
    }

    /// Parses the CSV file at `file_path` and hands its measurements to
    /// `ingest`, in file order.
    ///
    /// The sink is called each time [`batch::INGESTION_BATCH_SIZE`]
    /// measurements have accumulated (checked before each row) and once more
    /// at the end for the remainder. It is never called with an empty slice.
    /// Rows with unparseable fields are logged and skipped. Bytes that are
    /// not valid UTF-8 are replaced with U+FFFD.
    ///
    /// # Errors
    ///
    /// * [`ParseError::InvalidArgument`] if `file_path` is blank, before any
    ///   I/O
    /// * [`ParseError::Csv`] if the file cannot be opened or read
    /// * [`ParseError::MissingColumn`] if the header lacks the timestamp,
    ///   location or filter column
    /// * [`ParseError::Ingest`] if the sink fails; parsing stops there
    pub fn parse_and_ingest<F>(&self, file_path: &str, mut ingest: F) -> Result<ParseSummary, ParseError>
    where
        F: FnMut(&[Measurement]) -> Result<(), IngestError>,
    {
        if file_path.trim().is_empty() {
            return Err(ParseError::InvalidArgument(
                "File path must not be empty".to_string(),
            ));
        }

        let csv_error = |source: csv::Error| ParseError::Csv {
            path: file_path.to_string(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter())
            .flexible(true)
            .from_path(file_path)
            .map_err(csv_error)?;

        let header = Header::new(&decode_record(
            reader.byte_headers().map_err(csv_error)?.clone(),
        ));
        self.check_header(&header, file_path)?;

        let mut batch = MeasurementBatch::new(&mut ingest);
        let mut summary = ParseSummary::default();
        let mut parsed = Vec::with_capacity(nantes::HOURS_PER_ROW);

        for result in reader.byte_records() {
            let record = decode_record(result.map_err(csv_error)?);

            batch.flush_if_full().map_err(ParseError::Ingest)?;

            self.parse_row(&CsvRow::new(&header, &record), &mut parsed);

            summary.rows_read += 1;
            summary.measurements += parsed.len() as u64;
            for measurement in parsed.drain(..) {
                batch.push(measurement);
            }
        }

        batch.flush().map_err(ParseError::Ingest)?;
        summary.batches = batch.flushes();

        log::info!(
            "Parsed {} rows into {} {} measurements from {file_path}",
            summary.rows_read,
            summary.measurements,
            self.city()
        );

        Ok(summary)
    }

    fn check_header(&self, header: &Header, file_path: &str) -> Result<(), ParseError> {
        let (timestamp, location) = self.required_columns();

        let has_location = location.iter().any(|column| header.contains(column));

        let missing = match (header.contains(timestamp), has_location) {
            (false, _) => Some(timestamp),
            (true, false) => location.first().copied(),
            (true, true) => self
                .filter_column()
                .filter(|column| !header.contains(column)),
        };

        match missing {
            Some(column) => Err(ParseError::MissingColumn {
                column: column.to_string(),
                path: file_path.to_string(),
            }),
            None => Ok(()),
        }
    }
}
