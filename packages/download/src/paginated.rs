//! Paginated Socrata batch downloader.
//!
//! Socrata exports cap the number of rows per response, so a dataset is
//! fetched page by page with `$order`, `$limit` and `$offset` query
//! parameters. Each page lands in its own `{target}_{page}` file; once a
//! short page signals the end of the dataset, the pages are concatenated
//! into the target file with a single header row.
//!
//! Page files are left on disk after the download, whether it succeeds or
//! fails part-way, so a failed run can be inspected.

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::batch_results::{count_lines, write_batch_results};
use crate::single_file::SingleFileDownloader;
use crate::{DownloadError, Downloader, remove_stale_target};

/// Records requested per page unless overridden.
pub const DEFAULT_PAGE_SIZE: u64 = 500_000;

/// Downloads a dataset page by page and assembles the pages into one CSV.
///
/// Each page is fetched with the `D` downloader, a single attempt per page.
#[derive(Debug, Clone)]
pub struct PaginatedBatchDownloader<D = SingleFileDownloader> {
    page_downloader: D,
    page_size: u64,
}

impl PaginatedBatchDownloader {
    /// Creates a downloader with the default page size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_page_downloader(SingleFileDownloader::new(), DEFAULT_PAGE_SIZE)
    }
}

impl Default for PaginatedBatchDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Downloader> PaginatedBatchDownloader<D> {
    /// Creates a downloader that fetches each page with `page_downloader`.
    ///
    /// A `page_size` of zero is raised to one.
    #[must_use]
    pub fn with_page_downloader(page_downloader: D, page_size: u64) -> Self {
        Self {
            page_downloader,
            page_size: page_size.max(1),
        }
    }

    /// Overrides the number of records requested per page.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Returns the number of records requested per page.
    #[must_use]
    pub const fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Downloads pages until one has fewer than `page_size` data rows and
    /// returns that last page number, or `None` if a page failed.
    async fn download_pages(&self, base_url: &str, target_file_path: &Path) -> Option<u64> {
        let mut page_number: u64 = 0;

        loop {
            log::info!("Downloading results page {page_number} for base URL {base_url}");

            let url = page_url(base_url, self.page_size, page_number);
            let page_path = page_file_path(target_file_path, page_number);

            if !self.page_downloader.download(&url, &page_path).await {
                log::warn!("Aborting paginated download of {base_url} at page {page_number}");
                return None;
            }

            let records = match count_data_lines(page_path).await {
                Ok(records) => records,
                Err(e) => {
                    log::warn!("Could not count records of page {page_number} for {base_url}: {e}");
                    return None;
                }
            };

            log::debug!("Page {page_number} for {base_url} has {records} records");

            if records < self.page_size {
                return Some(page_number);
            }

            page_number += 1;
        }
    }
}

#[async_trait]
impl<D: Downloader> Downloader for PaginatedBatchDownloader<D> {
    async fn download(&self, url: &str, target_file_path: &Path) -> bool {
        let Some(last_page) = self.download_pages(url, target_file_path).await else {
            remove_stale_target(target_file_path).await;
            return false;
        };

        let target = target_file_path.to_path_buf();
        let result = tokio::task::spawn_blocking(move || assemble_pages(&target, last_page))
            .await
            .map_err(DownloadError::from)
            .and_then(|result| result);

        match result {
            Ok(()) => {
                log::info!(
                    "Assembled {} pages from {url} into {}",
                    last_page + 1,
                    target_file_path.display()
                );
                true
            }
            Err(e) => {
                log::warn!("Exception while downloading file at URL {url}: {e}");
                remove_stale_target(target_file_path).await;
                false
            }
        }
    }
}

/// Builds the URL of one page. The query layout is what the Socrata API
/// expects, byte for byte.
#[must_use]
pub fn page_url(base_url: &str, page_size: u64, page_number: u64) -> String {
    let offset = page_number * page_size;
    format!("{base_url}?$order=:id&$limit={page_size}&$offset={offset}")
}

/// Returns the path of the file holding one page: `{target}_{page}`.
#[must_use]
pub fn page_file_path(target_file_path: &Path, page_number: u64) -> PathBuf {
    let mut path = OsString::from(target_file_path.as_os_str());
    path.push(format!("_{page_number}"));
    PathBuf::from(path)
}

/// Number of records in a page: all lines but the header.
async fn count_data_lines(page_path: PathBuf) -> Result<u64, DownloadError> {
    let lines = tokio::task::spawn_blocking(move || count_lines(&page_path)).await??;
    Ok(lines.saturating_sub(1))
}

fn assemble_pages(target_file_path: &Path, last_page: u64) -> Result<(), DownloadError> {
    let file = File::create(target_file_path).map_err(DownloadError::io(target_file_path))?;
    let mut writer = BufWriter::new(file);

    for page_number in 0..=last_page {
        let page_path = page_file_path(target_file_path, page_number);

        if !write_batch_results(&mut writer, &page_path, page_number == 0) {
            return Err(DownloadError::PageCopy {
                path: page_path.display().to_string(),
            });
        }
    }

    writer.flush().map_err(DownloadError::io(target_file_path))?;

    Ok(())
}
