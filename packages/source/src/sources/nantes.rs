//! Nantes Métropole daily counter sheets.
//!
//! Each row is one counter for one day, with the hourly counts spread over
//! the columns `00` to `23`. A row expands into 24 measurements in hour
//! order, with times local to Europe/Paris.

use chrono_tz::Europe;
use velocity_db_source_models::Measurement;

use crate::parsing::{at_hour, parse_date, parse_hourly_count, resolve_local_time};
use crate::row::CsvRow;

pub const CITY: &str = "Nantes";

pub const DAY_COLUMN: &str = "Jour";

/// The export has shipped the accented header correctly encoded,
/// double-encoded and as Latin-1, which decodes to U+FFFD.
pub const LOCATION_COLUMNS: &[&str] = &["Libellé", "Libell√©", "Libell\u{fffd}"];

/// Measurements produced by one row.
pub const HOURS_PER_ROW: usize = 24;

const HOUR_COLUMNS: [&str; HOURS_PER_ROW] = [
    "00", "01", "02", "03", "04", "05", "06", "07", "08", "09", "10", "11", "12", "13", "14", "15",
    "16", "17", "18", "19", "20", "21", "22", "23",
];

pub fn parse_row(row: &CsvRow<'_>, out: &mut Vec<Measurement>) {
    let Some(day) = row.non_empty(DAY_COLUMN) else {
        return;
    };
    let Some(date) = parse_date(day) else {
        row.skip("date", day);
        return;
    };

    let location = row.first_of(LOCATION_COLUMNS).unwrap_or_default();

    for (hour, column) in (0..).zip(HOUR_COLUMNS) {
        let Some(timestamp) =
            at_hour(date, hour).and_then(|local| resolve_local_time(local, Europe::Paris))
        else {
            row.skip("date", day);
            continue;
        };

        let raw_count = row.get(column).unwrap_or_default();
        let Some(count) = parse_hourly_count(raw_count) else {
            row.skip("hourly traffic count", raw_count);
            continue;
        };

        out.push(Measurement::new(CITY, location, count, timestamp));
    }
}
