//! Eurométropole de Strasbourg counters, identified by counter id.

use velocity_db_source_models::Measurement;

use super::{Columns, read_measurement};
use crate::parsing::{parse_hourly_count, parse_offset_timestamp};
use crate::row::CsvRow;

pub const CITY: &str = "Strasbourg";

pub const COLUMNS: Columns = Columns {
    timestamp: "date",
    count: "sum_counts",
    location: &["id_compteur"],
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
