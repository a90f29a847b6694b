#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CSV downloaders for bicycle traffic open-data feeds.
//!
//! Every downloader implements the [`Downloader`] trait, whose contract is
//! deliberately boolean: transport and file errors are logged and absorbed
//! at this layer so that one failing city never aborts a whole run.
//!
//! - [`single_file`] streams one URL to one file.
//! - [`paginated`] pages through a Socrata-style batch API and stitches the
//!   pages together with [`batch_results`].
//! - [`parallel`] fans out one download per configured city.

pub mod batch_results;
pub mod paginated;
pub mod parallel;
pub mod single_file;

#[cfg(test)]
mod test_server;

use std::path::Path;

use async_trait::async_trait;

pub use paginated::{DEFAULT_PAGE_SIZE, PaginatedBatchDownloader};
pub use parallel::ParallelDownloadCoordinator;
pub use single_file::SingleFileDownloader;

/// Errors that can occur while downloading or assembling a CSV file.
///
/// These never cross the [`Downloader`] boundary; they exist so the
/// internals can use `?` and log a precise reason before reporting failure.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// HTTP request or response body stream failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("HTTP {status} for {url}")]
    HttpStatus {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// I/O error reading or writing a local file.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A page file could not be copied into the assembled output.
    #[error("Could not copy batch results from {path}")]
    PageCopy {
        /// Page file that failed.
        path: String,
    },

    /// A blocking file task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl DownloadError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Something that can fetch a URL into a local file.
///
/// Implementations are all-or-nothing: when `false` is returned, no target
/// file is left behind, neither a partial one nor one from an earlier run.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Downloads `url` into `target_file_path`, returning whether the file
    /// was fully written.
    async fn download(&self, url: &str, target_file_path: &Path) -> bool;
}

/// Removes a target file left behind by a failed download.
pub(crate) async fn remove_stale_target(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => log::info!("Removed stale file {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not delete stale file {}: {e}", path.display()),
    }
}
