//! Header-based field lookup over CSV records.

use std::collections::BTreeMap;

/// Decodes a raw record as UTF-8. Bytes that are not valid UTF-8 are
/// replaced with U+FFFD and the row is kept.
#[must_use]
pub fn decode_record(record: csv::ByteRecord) -> csv::StringRecord {
    match csv::StringRecord::from_byte_record(record) {
        Ok(decoded) => decoded,
        Err(e) => {
            let record = e.into_byte_record();
            let position = record.position().cloned();
            log::info!(
                "Invalid UTF-8 on line {}, replacing undecodable bytes",
                position.as_ref().map_or(0, csv::Position::line)
            );

            let mut decoded = csv::StringRecord::from_byte_record_lossy(record);
            decoded.set_position(position);
            decoded
        }
    }
}

/// Column positions of a CSV header, keyed by trimmed column name.
#[derive(Debug, Clone, Default)]
pub struct Header {
    columns: BTreeMap<String, usize>,
}

impl Header {
    /// Indexes the header record. Names are trimmed and a leading UTF-8 byte
    /// order mark is dropped. When a name repeats, the first column wins.
    #[must_use]
    pub fn new(record: &csv::StringRecord) -> Self {
        let mut columns = BTreeMap::new();

        for (index, name) in record.iter().enumerate() {
            let name = if index == 0 {
                name.trim_start_matches('\u{feff}')
            } else {
                name
            };
            columns.entry(name.trim().to_owned()).or_insert(index);
        }

        Self { columns }
    }

    /// Returns whether the header has a column with this name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.get(name).copied()
    }
}

/// One data row, read through its header.
#[derive(Debug, Clone, Copy)]
pub struct CsvRow<'a> {
    header: &'a Header,
    record: &'a csv::StringRecord,
}

impl<'a> CsvRow<'a> {
    #[must_use]
    pub const fn new(header: &'a Header, record: &'a csv::StringRecord) -> Self {
        Self { header, record }
    }

    /// Trimmed value of a column, or `None` if the column does not exist or
    /// the row is too short to have it.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let index = self.header.index_of(column)?;
        self.record.get(index).map(str::trim)
    }

    /// Like [`CsvRow::get`], but also `None` for an empty value.
    #[must_use]
    pub fn non_empty(&self, column: &str) -> Option<&'a str> {
        self.get(column).filter(|value| !value.is_empty())
    }

    /// Value of the first of `columns` present in the header.
    #[must_use]
    pub fn first_of(&self, columns: &[&str]) -> Option<&'a str> {
        columns.iter().find_map(|column| self.get(column))
    }

    /// Line of the source file this row was read from.
    #[must_use]
    pub fn line(&self) -> u64 {
        self.record.position().map_or(0, csv::Position::line)
    }

    /// Logs a field that could not be parsed. The row, or the hour of the
    /// row, is dropped by the caller.
    pub fn skip(&self, field: &str, value: &str) {
        log::info!(
            "Could not parse {field} '{value}' on line {}, skipping",
            self.line()
        );
    }
}
