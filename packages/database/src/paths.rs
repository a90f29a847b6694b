//! File locations inside the data directory.

use std::path::{Path, PathBuf};

use crate::DbError;

/// File name of the measurement database.
pub const DATABASE_FILE_NAME: &str = "velocitydb.duckdb";

/// Returns the database path inside `data_directory`.
#[must_use]
pub fn database_path(data_directory: &Path) -> PathBuf {
    data_directory.join(DATABASE_FILE_NAME)
}

/// Returns the write-ahead log `DuckDB` keeps next to `database`.
#[must_use]
pub fn wal_path(database: &Path) -> PathBuf {
    let mut path = database.as_os_str().to_owned();
    path.push(".wal");
    PathBuf::from(path)
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns [`DbError::Io`] if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> Result<(), DbError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|source| DbError::Io {
            path: path.display().to_string(),
            source,
        })?;
    }
    Ok(())
}

/// Removes a file, treating a missing file as already removed. Returns
/// whether a file was deleted.
///
/// # Errors
///
/// Returns [`DbError::Io`] if the file exists but cannot be removed.
pub fn remove_if_exists(path: &Path) -> Result<bool, DbError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(DbError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}
