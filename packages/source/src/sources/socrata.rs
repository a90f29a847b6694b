//! Socrata open-data counter exports.
//!
//! Socrata publishes local date-times without an offset, so every city
//! served this way carries its own time zone.

use chrono_tz::Tz;
use velocity_db_source_models::Measurement;

use super::{Columns, read_measurement};
use crate::parsing::{parse_hourly_count, parse_local_timestamp, resolve_local_time};
use crate::row::CsvRow;

pub const COLUMNS: Columns = Columns {
    timestamp: "epoch",
    count: "hourly_count",
    location: &["name"],
};

/// City name and time zone of a Socrata-served city.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocrataCityInfo {
    pub city_name: String,
    pub zone: Tz,
}

impl SocrataCityInfo {
    #[must_use]
    pub fn new(city_name: impl Into<String>, zone: Tz) -> Self {
        Self {
            city_name: city_name.into(),
            zone,
        }
    }
}

pub fn parse_row(info: &SocrataCityInfo, row: &CsvRow<'_>, out: &mut Vec<Measurement>) {
    read_measurement(
        row,
        &info.city_name,
        &COLUMNS,
        |value| parse_local_timestamp(value).and_then(|local| resolve_local_time(local, info.zone)),
        parse_hourly_count,
        out,
    );
}
