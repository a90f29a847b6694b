//! Per-city CSV layouts.
//!
//! Each module knows the column names of one open-data export and turns a
//! row into zero or more [`Measurement`]s.

pub mod bordeaux;
pub mod nantes;
pub mod paris;
pub mod rennes;
pub mod socrata;
pub mod strasbourg;

use chrono::{DateTime, Utc};
use velocity_db_source_models::Measurement;

use crate::row::CsvRow;

/// Column names of a layout with one measurement per row.
#[derive(Debug, Clone, Copy)]
pub struct Columns {
    /// Timestamp column. Also the column a header must have to be accepted.
    pub timestamp: &'static str,
    /// Hourly count column.
    pub count: &'static str,
    /// Location column, with alternate spellings in order of preference.
    pub location: &'static [&'static str],
}

/// Reads one measurement from `row`.
///
/// Rows with an empty timestamp are dropped silently. Rows whose timestamp
/// or count cannot be parsed are logged and dropped.
pub(crate) fn read_measurement(
    row: &CsvRow<'_>,
    city: &str,
    columns: &Columns,
    parse_timestamp: impl FnOnce(&str) -> Option<DateTime<Utc>>,
    parse_count: fn(&str) -> Option<i32>,
    out: &mut Vec<Measurement>,
) {
    let Some(raw_timestamp) = row.non_empty(columns.timestamp) else {
        return;
    };
    let Some(timestamp) = parse_timestamp(raw_timestamp) else {
        row.skip("date", raw_timestamp);
        return;
    };

    let raw_count = row.get(columns.count).unwrap_or_default();
    let Some(count) = parse_count(raw_count) else {
        row.skip("hourly traffic count", raw_count);
        return;
    };

    let location = row.first_of(columns.location).unwrap_or_default();

    out.push(Measurement::new(city, location, count, timestamp));
}

#[cfg(test)]
pub(crate) mod test_rows {
    use crate::row::{CsvRow, Header};
    use velocity_db_source_models::Measurement;

    /// Runs `parse_row` over every data line of an in-memory CSV.
    pub fn parse_all(
        delimiter: u8,
        csv: &str,
        mut parse_row: impl FnMut(&CsvRow<'_>, &mut Vec<Measurement>),
    ) -> Vec<Measurement> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(csv.as_bytes());
        let header = Header::new(reader.headers().unwrap());

        let mut out = Vec::new();
        for record in reader.records() {
            let record = record.unwrap();
            parse_row(&CsvRow::new(&header, &record), &mut out);
        }
        out
    }
}
