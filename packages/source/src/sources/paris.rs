//! Ville de Paris bicycle counters. Counts are published as decimals.

use velocity_db_source_models::Measurement;

use super::{Columns, read_measurement};
use crate::parsing::{parse_decimal_hourly_count, parse_offset_timestamp};
use crate::row::CsvRow;

pub const CITY: &str = "Paris";

pub const COLUMNS: Columns = Columns {
    timestamp: "Date et heure de comptage",
    count: "Comptage horaire",
    location: &["Nom du compteur"],
};

pub fn parse_row(row: &CsvRow<'_>, out: &mut Vec<Measurement>) {
    read_measurement(
        row,
        CITY,
        &COLUMNS,
        parse_offset_timestamp,
        parse_decimal_hourly_count,
        out,
    );
}
