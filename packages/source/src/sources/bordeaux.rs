//! Bordeaux Métropole permanent counters.
//!
//! The export mixes induction loops (`BOUCLE`) with other counter types; only
//! loops are kept.

use velocity_db_source_models::Measurement;

use super::{Columns, read_measurement};
use crate::parsing::{parse_hourly_count, parse_offset_timestamp};
use crate::row::CsvRow;

pub const CITY: &str = "Bordeaux";

/// `comptage_5m` holds the hourly count despite its name.
pub const COLUMNS: Columns = Columns {
    timestamp: "Date et heure de comptage",
    count: "comptage_5m",
    location: &["libelle"],
};

pub const TYPE_COLUMN: &str = "type";
const LOOP_TYPE: &str = "BOUCLE";

pub fn parse_row(row: &CsvRow<'_>, out: &mut Vec<Measurement>) {
    if row.get(TYPE_COLUMN) != Some(LOOP_TYPE) {
        return;
    }

    read_measurement(
        row,
        CITY,
        &COLUMNS,
        parse_offset_timestamp,
        parse_hourly_count,
        out,
    );
}
