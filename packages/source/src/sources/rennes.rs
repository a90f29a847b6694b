//! Rennes Métropole counters.

use velocity_db_source_models::Measurement;

use super::{Columns, read_measurement};
use crate::parsing::{parse_hourly_count, parse_offset_timestamp};
use crate::row::CsvRow;

pub const CITY: &str = "Rennes";

pub const COLUMNS: Columns = Columns {
    timestamp: "date",
    count: "counts",
    location: &["name"],
};

pub fn parse_row(row: &CsvRow<'_>, out: &mut Vec<Measurement>) {
    read_measurement(
        row,
        CITY,
        &COLUMNS,
        parse_offset_timestamp,
        parse_hourly_count,
        out,
    );
}
