//! The `city_traffic_measurement` table.

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::Connection;
use velocity_db_source_models::Measurement;

use crate::DbError;
use crate::paths::{database_path, ensure_dir, remove_if_exists, wal_path};

/// Rows per multi-row INSERT statement.
const CHUNK_SIZE: usize = 1_000;

/// Bound parameters per measurement row.
const PARAMS_PER_ROW: usize = 4;

/// Owns the connection to the measurement database.
pub struct DatabaseManager {
    conn: Connection,
}

impl std::fmt::Debug for DatabaseManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseManager").finish_non_exhaustive()
    }
}

impl DatabaseManager {
    /// Opens (or creates) the database in `data_directory` and ensures the
    /// schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the directory, connection or schema cannot be
    /// created.
    pub fn open(data_directory: &Path) -> Result<Self, DbError> {
        ensure_dir(data_directory)?;

        let path = database_path(data_directory);
        log::info!("Opening database {}", path.display());

        Self::from_connection(Connection::open(&path)?)
    }

    /// Opens a throwaway in-memory database with the same schema.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema cannot be created.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        create_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Deletes the database in `data_directory`, along with its write-ahead
    /// log. Does nothing if there is no database.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Io`] if an existing file cannot be removed.
    pub fn delete_database(data_directory: &Path) -> Result<(), DbError> {
        let path = database_path(data_directory);

        if remove_if_exists(&path)? {
            log::info!("Deleted existing database {}", path.display());
        }
        remove_if_exists(&wal_path(&path))?;

        Ok(())
    }

    /// Inserts `measurements` in a single transaction and returns the number
    /// of rows written. An empty slice does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if any insert fails; nothing from this call is
    /// kept in that case.
    pub fn ingest(&mut self, measurements: &[Measurement]) -> Result<u64, DbError> {
        if measurements.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        let mut inserted = 0u64;

        for chunk in measurements.chunks(CHUNK_SIZE) {
            let mut sql = String::from(
                "INSERT INTO city_traffic_measurement (
                    city, location_name, hourly_traffic_count, measurement_timestamp
                ) VALUES ",
            );

            for i in 0..chunk.len() {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push_str("(?, ?, ?, ?::TIMESTAMPTZ)");
            }

            let mut stmt = tx.prepare(&sql)?;
            let mut param_idx = 1usize;

            for measurement in chunk {
                stmt.raw_bind_parameter(param_idx, &measurement.city)?;
                stmt.raw_bind_parameter(param_idx + 1, &measurement.location_name)?;
                stmt.raw_bind_parameter(param_idx + 2, measurement.hourly_traffic_count)?;
                stmt.raw_bind_parameter(
                    param_idx + 3,
                    measurement
                        .timestamp
                        .format("%Y-%m-%d %H:%M:%S+00:00")
                        .to_string(),
                )?;

                param_idx += PARAMS_PER_ROW;
            }

            let rows = stmt.raw_execute()?;
            inserted += u64::try_from(rows).unwrap_or(0);
        }

        tx.commit()?;

        log::debug!("Ingested {inserted} measurements");

        Ok(inserted)
    }

    /// Number of measurements stored for `city`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub fn count_measurements_for_city(&self, city: &str) -> Result<u64, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT COUNT(*) FROM city_traffic_measurement WHERE city = ?")?;
        let count: i64 = stmt.query_row([city], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Number of measurements stored across all cities.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub fn count_measurements(&self) -> Result<u64, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT COUNT(*) FROM city_traffic_measurement")?;
        let count: i64 = stmt.query_row([], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Measurements stored for `city`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails or a stored timestamp cannot be
    /// read back.
    pub fn measurements_for_city(&self, city: &str) -> Result<Vec<Measurement>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT city, location_name, hourly_traffic_count, measurement_timestamp::VARCHAR
             FROM city_traffic_measurement
             WHERE city = ?
             ORDER BY id",
        )?;

        let rows = stmt.query_map([city], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i32>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut measurements = Vec::new();
        for row in rows {
            let (city, location_name, count, timestamp) = row?;
            let timestamp = parse_timestamp(&timestamp).ok_or_else(|| DbError::Conversion {
                message: format!("unreadable timestamp {timestamp:?}"),
            })?;
            measurements.push(Measurement::new(city, location_name, count, timestamp));
        }

        Ok(measurements)
    }
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE SEQUENCE IF NOT EXISTS city_traffic_measurement_id_seq;

        CREATE TABLE IF NOT EXISTS city_traffic_measurement (
            id BIGINT NOT NULL DEFAULT nextval('city_traffic_measurement_id_seq'),
            city VARCHAR NOT NULL,
            location_name VARCHAR NOT NULL,
            hourly_traffic_count INTEGER NOT NULL,
            measurement_timestamp TIMESTAMPTZ NOT NULL
        );",
    )?;

    Ok(())
}

/// Parses `DuckDB`'s text form of a `TIMESTAMPTZ`.
///
/// The offset is rendered in the session time zone, either as `+00` or
/// `+02:00`, and fractional seconds only appear when non-zero.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }

    log::warn!("Failed to parse timestamp: {s:?}");
    None
}
